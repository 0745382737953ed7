//! Server-sent event stream of workflow notifications, plus admin endpoints
//! to inspect connected clients and push ad-hoc messages.

use super::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    notifications::{HubStats, Notifier, Subscription},
};
use axum::{
    extract::{Json, State},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, time::Duration};
use tokio::time::{timeout_at, Instant};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const REQUESTER_SESSION: Duration = Duration::from_secs(60 * 60);
const ADMIN_SESSION: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendNotificationBody {
    /// Recipients; empty broadcasts to everyone
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 50))]
    #[serde(rename = "type")]
    pub kind: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendNotificationResponse {
    pub message: String,
    pub targets: Vec<Uuid>,
    pub stats: HubStats,
}

enum StreamState {
    Open(Subscription, Instant),
    Done,
}

/// Turns a hub subscription into SSE events. Ends with `disconnected` when the
/// hub drops the subscriber, or with `timeout` once the session expires.
fn subscription_events(
    subscription: Subscription,
    session: Duration,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    let deadline = Instant::now() + session;
    stream::unfold(
        StreamState::Open(subscription, deadline),
        |state| async move {
            let StreamState::Open(mut subscription, deadline) = state else {
                return None;
            };
            match timeout_at(deadline, subscription.recv()).await {
                Ok(Some(message)) => Some((
                    Ok::<_, Infallible>(SseEvent::default().event("message").data(message)),
                    StreamState::Open(subscription, deadline),
                )),
                Ok(None) => Some((
                    Ok(SseEvent::default()
                        .event("disconnected")
                        .data("channel closed")),
                    StreamState::Done,
                )),
                Err(_) => Some((
                    Ok(SseEvent::default()
                        .event("timeout")
                        .data("session expired")),
                    StreamState::Done,
                )),
            }
        },
    )
}

/// Subscribe to notifications
///
/// Accepts the token either as a bearer header or as `?token=` for clients
/// that cannot set headers.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(("token" = Option<String>, Query, description = "Bearer token for EventSource clients")),
    responses(
        (status = 200, description = "text/event-stream of notifications"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications"
)]
pub async fn stream_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    let is_admin = user.is_admin();
    let subscription = state
        .notifications
        .subscribe(user.user_id, user.name.clone(), is_admin);
    info!(user_id = %user.user_id, subscriber_id = %subscription.id(), "notification stream opened");

    let session = if is_admin {
        ADMIN_SESSION
    } else {
        REQUESTER_SESSION
    };
    let connected = SseEvent::default()
        .event("connected")
        .data(format!("Connected as {} ({})", user.name, user.role));

    let events = stream::once(async move { Ok::<_, Infallible>(connected) })
        .chain(subscription_events(subscription, session));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.sse_keep_alive_secs.max(1)))
            .text("ping"),
    )
}

/// Connected notification clients (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/notifications/stats",
    responses(
        (status = 200, description = "Connected clients", body = HubStats),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn notification_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    user.actor().require_admin().map_err(map_service_error)?;
    Ok(success_response(state.notifications.stats()))
}

/// Push a custom notification (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/notifications/send",
    request_body = SendNotificationBody,
    responses(
        (status = 200, description = "Notification published", body = SendNotificationResponse),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn send_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendNotificationBody>,
) -> Result<impl IntoResponse, ApiError> {
    user.actor().require_admin().map_err(map_service_error)?;
    validate_input(&payload)?;

    let message = format!("{}:{}:{}", payload.kind, payload.title, payload.message);
    let targets = (!payload.user_ids.is_empty()).then(|| payload.user_ids.clone());
    state.notifications.publish(message, targets);

    info!(sent_by = %user.user_id, recipients = payload.user_ids.len(), "custom notification sent");
    Ok(success_response(SendNotificationResponse {
        message: "Notification sent".to_string(),
        targets: payload.user_ids,
        stats: state.notifications.stats(),
    }))
}

/// The event stream sits behind query-token auth; the admin endpoints behind
/// regular bearer auth.
pub fn notification_stream_routes() -> Router<AppState> {
    Router::new().route("/", get(stream_notifications))
}

pub fn notification_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(notification_stats))
        .route("/send", post(send_notification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationHub;

    #[tokio::test]
    async fn stream_forwards_messages_until_the_hub_goes_away() {
        let hub = NotificationHub::new(4);
        let subscription = hub.subscribe(Uuid::new_v4(), "Ana".into(), false);
        hub.publish("test:hello".into(), None);
        drop(hub);

        let events: Vec<_> = subscription_events(subscription, Duration::from_secs(5))
            .collect()
            .await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn stream_ends_when_the_session_expires() {
        let hub = NotificationHub::new(4);
        let subscription = hub.subscribe(Uuid::new_v4(), "Ana".into(), false);

        let events: Vec<_> = subscription_events(subscription, Duration::from_millis(50))
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }
}

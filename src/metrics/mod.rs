//! Prometheus metrics for the purchase request workflow.
//!
//! Every collector lives in the process-wide [`REGISTRY`] and is rendered in
//! the text exposition format by [`metrics_handler`] at `/metrics`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("purchase_requests".into()), None).expect("registry can be created");

    /// Lifecycle command outcomes, labelled by operation and outcome
    pub static ref LIFECYCLE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("lifecycle_operations_total", "Lifecycle commands by operation and outcome"),
        &["operation", "outcome"]
    )
    .expect("metric can be created");

    pub static ref RECEIPTS_RECORDED: IntCounter = IntCounter::new(
        "receipts_recorded_total",
        "Receipts accepted against approved items"
    )
    .expect("metric can be created");

    pub static ref RECEIPT_NET_UNITS: IntCounter = IntCounter::new(
        "receipt_net_units_total",
        "Net units received (received minus rejected)"
    )
    .expect("metric can be created");

    pub static ref RECEIPTS_REFUSED: IntCounterVec = IntCounterVec::new(
        Opts::new("receipts_refused_total", "Receipts refused by a guard"),
        &["reason"]
    )
    .expect("metric can be created");

    pub static ref NOTIFICATIONS_DELIVERED: IntCounter = IntCounter::new(
        "notifications_delivered_total",
        "Notification messages queued to a subscriber"
    )
    .expect("metric can be created");

    pub static ref NOTIFICATIONS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("notifications_dropped_total", "Notification messages dropped"),
        &["reason"]
    )
    .expect("metric can be created");

    pub static ref NOTIFICATION_SUBSCRIBERS: IntGauge = IntGauge::new(
        "notification_subscribers",
        "Currently connected notification subscribers"
    )
    .expect("metric can be created");

    pub static ref AUTH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_failures_total", "Rejected logins and tokens"),
        &["reason"]
    )
    .expect("metric can be created");

    pub static ref DB_TRANSACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("db_transactions_total", "Database transactions by operation and result"),
        &["operation", "result"]
    )
    .expect("metric can be created");

    pub static ref DB_TRANSACTION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("db_transaction_seconds", "Database transaction latency"),
        &["operation"]
    )
    .expect("metric can be created");
}

/// Registers all collectors once. Safe to call repeatedly.
pub fn init_metrics() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(LIFECYCLE_OPERATIONS.clone()),
            Box::new(RECEIPTS_RECORDED.clone()),
            Box::new(RECEIPT_NET_UNITS.clone()),
            Box::new(RECEIPTS_REFUSED.clone()),
            Box::new(NOTIFICATIONS_DELIVERED.clone()),
            Box::new(NOTIFICATIONS_DROPPED.clone()),
            Box::new(NOTIFICATION_SUBSCRIBERS.clone()),
            Box::new(AUTH_FAILURES.clone()),
            Box::new(DB_TRANSACTIONS.clone()),
            Box::new(DB_TRANSACTION_SECONDS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                error!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Records the outcome of a lifecycle command.
pub fn record_lifecycle(operation: &str, ok: bool) {
    LIFECYCLE_OPERATIONS
        .with_label_values(&[operation, if ok { "ok" } else { "error" }])
        .inc();
}

/// Renders the registry in the prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    init_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_contains_namespaced_counters() {
        init_metrics();
        record_lifecycle("review_item", true);
        RECEIPTS_REFUSED.with_label_values(&["over_order"]).inc();

        let text = render().unwrap();
        assert!(text.contains("purchase_requests_lifecycle_operations_total"));
        assert!(text.contains("operation=\"review_item\""));
        assert!(text.contains("purchase_requests_receipts_refused_total"));
    }

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(render().is_ok());
    }
}

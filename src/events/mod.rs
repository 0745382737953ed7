use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{ItemStatus, Priority, RequestStatus};
use crate::notifications::Notifier;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Hands an event to the processing loop without waiting. A full or closed
    /// channel is logged and the event dropped; callers never fail on it.
    pub fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = event.name(), "event channel full; event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                error!(event = event.name(), "event channel closed; event dropped");
            }
        }
    }
}

/// Domain events emitted after a workflow write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RequestCreated {
        request_id: Uuid,
        requester_id: Uuid,
    },
    RequestUpdated {
        request_id: Uuid,
        requester_id: Uuid,
        status: RequestStatus,
    },
    ItemReviewed {
        item_id: Uuid,
        request_id: Uuid,
        requester_id: Uuid,
        status: ItemStatus,
    },
    RequestReviewed {
        request_id: Uuid,
        requester_id: Uuid,
        status: RequestStatus,
    },
    RequestCompleted {
        request_id: Uuid,
        requester_id: Uuid,
    },
    RequestReopened {
        request_id: Uuid,
        requester_id: Uuid,
    },
    PriorityUpdated {
        request_id: Uuid,
        requester_id: Uuid,
        priority: Priority,
    },
    PriorityRemoved {
        request_id: Uuid,
        requester_id: Uuid,
    },
    MarkedUrgent {
        request_id: Uuid,
        requester_id: Uuid,
    },
    MarkedNormal {
        request_id: Uuid,
        requester_id: Uuid,
    },
    ItemReceived {
        item_id: Uuid,
        request_id: Uuid,
        requester_id: Uuid,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RequestCreated { .. } => "request_created",
            Event::RequestUpdated { .. } => "request_updated",
            Event::ItemReviewed { .. } => "item_reviewed",
            Event::RequestReviewed { .. } => "request_reviewed",
            Event::RequestCompleted { .. } => "request_completed",
            Event::RequestReopened { .. } => "request_reopened",
            Event::PriorityUpdated { .. } => "priority_updated",
            Event::PriorityRemoved { .. } => "priority_removed",
            Event::MarkedUrgent { .. } => "marked_urgent",
            Event::MarkedNormal { .. } => "marked_normal",
            Event::ItemReceived { .. } => "item_received",
        }
    }

    /// Wire string consumed by notification subscribers.
    pub fn notification(&self) -> String {
        match self {
            Event::RequestCreated { request_id, .. } => format!("new-request:{}", request_id),
            Event::RequestUpdated {
                request_id, status, ..
            } => format!("update-request:{}:{}", request_id, status),
            Event::ItemReviewed {
                item_id, status, ..
            } => format!("review-item:{}:{}", item_id, status),
            Event::RequestReviewed {
                request_id, status, ..
            } => format!("review-request:{}:{}", request_id, status),
            Event::RequestCompleted { request_id, .. } => {
                format!("complete-request:{}", request_id)
            }
            Event::RequestReopened { request_id, .. } => format!("reopen-request:{}", request_id),
            Event::PriorityUpdated {
                request_id,
                priority,
                ..
            } => format!("priority-updated:{}:{}", request_id, priority),
            Event::PriorityRemoved { request_id, .. } => {
                format!("priority-removed:{}", request_id)
            }
            Event::MarkedUrgent { request_id, .. } => format!("priority-urgent:{}", request_id),
            Event::MarkedNormal { request_id, .. } => format!("priority-normal:{}", request_id),
            Event::ItemReceived { item_id, .. } => format!("item-received:{}", item_id),
        }
    }

    /// Owner of the affected request; admins are reached regardless.
    pub fn audience(&self) -> Uuid {
        match self {
            Event::RequestCreated { requester_id, .. }
            | Event::RequestUpdated { requester_id, .. }
            | Event::ItemReviewed { requester_id, .. }
            | Event::RequestReviewed { requester_id, .. }
            | Event::RequestCompleted { requester_id, .. }
            | Event::RequestReopened { requester_id, .. }
            | Event::PriorityUpdated { requester_id, .. }
            | Event::PriorityRemoved { requester_id, .. }
            | Event::MarkedUrgent { requester_id, .. }
            | Event::MarkedNormal { requester_id, .. }
            | Event::ItemReceived { requester_id, .. } => *requester_id,
        }
    }
}

/// Drains the event channel, logging each event and publishing its
/// notification. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!(event = event.name(), payload = ?event, "Received event");
        notifier.publish(event.notification(), Some(vec![event.audience()]));
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::MockNotifier;
    use mockall::predicate::eq;

    #[test]
    fn notification_strings_match_wire_format() {
        let id = Uuid::nil();
        let cases = vec![
            (
                Event::ItemReviewed {
                    item_id: id,
                    request_id: id,
                    requester_id: id,
                    status: ItemStatus::Suspended,
                },
                format!("review-item:{}:suspended", id),
            ),
            (
                Event::RequestReviewed {
                    request_id: id,
                    requester_id: id,
                    status: RequestStatus::Partial,
                },
                format!("review-request:{}:partial", id),
            ),
            (
                Event::PriorityUpdated {
                    request_id: id,
                    requester_id: id,
                    priority: Priority::High,
                },
                format!("priority-updated:{}:high", id),
            ),
            (
                Event::MarkedUrgent {
                    request_id: id,
                    requester_id: id,
                },
                format!("priority-urgent:{}", id),
            ),
            (
                Event::ItemReceived {
                    item_id: id,
                    request_id: id,
                    requester_id: id,
                },
                format!("item-received:{}", id),
            ),
            (
                Event::RequestCreated {
                    request_id: id,
                    requester_id: id,
                },
                format!("new-request:{}", id),
            ),
        ];

        for (event, expected) in cases {
            assert_eq!(event.notification(), expected);
        }
    }

    #[tokio::test]
    async fn processing_loop_publishes_to_request_owner() {
        let requester = Uuid::new_v4();
        let request_id = Uuid::new_v4();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_publish()
            .with(
                eq(format!("complete-request:{}", request_id)),
                eq(Some(vec![requester])),
            )
            .times(1)
            .return_const(());

        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::RequestCompleted {
            request_id,
            requester_id: requester,
        });
        drop(sender);

        process_events(rx, Arc::new(notifier)).await;
    }

    #[test]
    fn send_or_log_drops_when_channel_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        let event = Event::PriorityRemoved {
            request_id: Uuid::nil(),
            requester_id: Uuid::nil(),
        };

        sender.send_or_log(event.clone());
        sender.send_or_log(event.clone());

        assert_eq!(rx.try_recv().ok(), Some(event));
        assert!(rx.try_recv().is_err());
    }
}

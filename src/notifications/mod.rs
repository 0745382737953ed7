//! In-process notification fan-out.
//!
//! Lifecycle code only sees the [`Notifier`] trait: a fire-and-forget sink
//! that never blocks and never fails the caller. [`NotificationHub`] is the
//! implementation backing the server-sent events stream.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::metrics::{NOTIFICATIONS_DELIVERED, NOTIFICATIONS_DROPPED, NOTIFICATION_SUBSCRIBERS};

/// Message sink for workflow notifications.
///
/// `targets = None` broadcasts to every subscriber. With targets, the message
/// reaches the listed users plus every admin subscriber.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn publish(&self, message: String, targets: Option<Vec<Uuid>>);
}

struct Subscriber {
    user_id: Uuid,
    user_name: String,
    is_admin: bool,
    connected_at: DateTime<Utc>,
    tx: mpsc::Sender<String>,
}

impl Subscriber {
    fn wants(&self, targets: Option<&[Uuid]>) -> bool {
        match targets {
            None => true,
            Some(ids) => self.is_admin || ids.contains(&self.user_id),
        }
    }
}

/// Registry of connected notification subscribers.
pub struct NotificationHub {
    subscribers: DashMap<Uuid, Subscriber>,
    buffer: usize,
    me: Weak<NotificationHub>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectedClient {
    pub user_id: Uuid,
    pub user_name: String,
    pub is_admin: bool,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HubStats {
    pub total: usize,
    pub admins: usize,
    pub requesters: usize,
    pub clients: Vec<ConnectedClient>,
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
            me: me.clone(),
        })
    }

    /// Registers a subscriber; it is removed when the returned handle drops.
    pub fn subscribe(&self, user_id: Uuid, user_name: String, is_admin: bool) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.subscribers.insert(
            id,
            Subscriber {
                user_id,
                user_name,
                is_admin,
                connected_at: Utc::now(),
                tx,
            },
        );
        NOTIFICATION_SUBSCRIBERS.inc();
        info!(subscriber_id = %id, user_id = %user_id, is_admin, "notification subscriber connected");

        Subscription {
            id,
            hub: self.me.clone(),
            rx,
        }
    }

    fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            NOTIFICATION_SUBSCRIBERS.dec();
            info!(subscriber_id = %id, "notification subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn stats(&self) -> HubStats {
        let clients: Vec<ConnectedClient> = self
            .subscribers
            .iter()
            .map(|entry| ConnectedClient {
                user_id: entry.user_id,
                user_name: entry.user_name.clone(),
                is_admin: entry.is_admin,
                connected_at: entry.connected_at,
            })
            .collect();
        let admins = clients.iter().filter(|c| c.is_admin).count();
        HubStats {
            total: clients.len(),
            admins,
            requesters: clients.len() - admins,
            clients,
        }
    }
}

impl Notifier for NotificationHub {
    fn publish(&self, message: String, targets: Option<Vec<Uuid>>) {
        let targets = targets.as_deref();
        let mut closed = Vec::new();
        let mut delivered = 0usize;

        for entry in self.subscribers.iter() {
            if !entry.wants(targets) {
                continue;
            }
            match entry.tx.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    NOTIFICATIONS_DELIVERED.inc();
                }
                Err(TrySendError::Full(_)) => {
                    NOTIFICATIONS_DROPPED.with_label_values(&["full"]).inc();
                    warn!(subscriber_id = %entry.key(), "subscriber buffer full; notification dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    NOTIFICATIONS_DROPPED.with_label_values(&["closed"]).inc();
                    closed.push(*entry.key());
                }
            }
        }

        // removal happens after iteration to avoid holding shard locks
        for id in closed {
            self.unsubscribe(id);
        }

        debug!(message = %message, delivered, "notification published");
    }
}

/// Receiving half of a hub subscription.
pub struct Subscription {
    id: Uuid,
    hub: Weak<NotificationHub>,
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admins_receive_targeted_messages_for_others() {
        let hub = NotificationHub::new(8);
        let requester = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut admin_sub = hub.subscribe(Uuid::new_v4(), "Ana".into(), true);
        let mut owner_sub = hub.subscribe(requester, "Bruno".into(), false);
        let mut other_sub = hub.subscribe(other, "Carla".into(), false);

        hub.publish("review-item:1:approved".into(), Some(vec![requester]));

        assert_eq!(admin_sub.recv().await.as_deref(), Some("review-item:1:approved"));
        assert_eq!(owner_sub.recv().await.as_deref(), Some("review-item:1:approved"));
        assert!(other_sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn untargeted_messages_reach_everyone() {
        let hub = NotificationHub::new(8);
        let mut a = hub.subscribe(Uuid::new_v4(), "a".into(), false);
        let mut b = hub.subscribe(Uuid::new_v4(), "b".into(), false);

        hub.publish("test:hello".into(), None);

        assert_eq!(a.recv().await.as_deref(), Some("test:hello"));
        assert_eq!(b.recv().await.as_deref(), Some("test:hello"));
    }

    #[test]
    fn full_buffers_drop_instead_of_blocking() {
        let hub = NotificationHub::new(1);
        let mut sub = hub.subscribe(Uuid::new_v4(), "slow".into(), true);

        hub.publish("first".into(), None);
        hub.publish("second".into(), None);

        assert_eq!(sub.rx.try_recv().ok().as_deref(), Some("first"));
        assert!(sub.rx.try_recv().is_err());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = NotificationHub::new(4);
        let sub = hub.subscribe(Uuid::new_v4(), "x".into(), false);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.stats().requesters, 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }
}

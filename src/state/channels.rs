//! Per-entity live-update channels.
//!
//! Each channel is a `watch` slot holding the latest value: publishing never
//! blocks and never waits on subscribers, a slow subscriber only ever sees the
//! newest value.

use dashmap::DashMap;
use futures_util::stream::{self, Stream};
use tokio::sync::watch;

/// Registry of lazily created channels keyed by entity id.
pub struct ChannelRegistry<T> {
    senders: DashMap<String, watch::Sender<Option<T>>>,
}

impl<T: Clone> ChannelRegistry<T> {
    pub fn new() -> Self {
        Self { senders: DashMap::new() }
    }

    /// Subscribe to `id`, creating the channel if needed. `current` seeds a
    /// freshly created channel.
    pub fn subscribe(&self, id: &str, current: Option<T>) -> Subscription<T> {
        let sender = self
            .senders
            .entry(id.to_string())
            .or_insert_with(|| watch::channel(current).0);
        Subscription::new(sender.subscribe())
    }

    /// Publish a new value, creating the channel if needed.
    pub fn publish(&self, id: &str, value: T) {
        if let Some(sender) = self.senders.get(id) {
            sender.send_replace(Some(value));
            return;
        }
        self.senders
            .entry(id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(value));
    }

    /// Empty an existing channel. Subscribers keep waiting for the next value;
    /// `current` reads `None` until then.
    pub fn retract(&self, id: &str) {
        if let Some(sender) = self.senders.get(id) {
            sender.send_replace(None);
        }
    }

    /// Drop channels that have no live subscribers. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.senders.len();
        self.senders.retain(|_, sender| sender.receiver_count() > 0);
        before - self.senders.len()
    }

    pub fn subscriber_count(&self, id: &str) -> usize {
        self.senders.get(id).map(|s| s.receiver_count()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl<T: Clone> Default for ChannelRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable subscription. Yields the current value (if any) first, then
/// every later value. Dropping it or calling `cancel` ends delivery.
pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
    primed: bool,
}

impl<T: Clone> Subscription<T> {
    fn new(rx: watch::Receiver<Option<T>>) -> Self {
        Self { rx, primed: false }
    }

    /// Latest value without consuming a notification.
    pub fn current(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// True if a value is waiting to be returned by `next` without blocking.
    pub fn has_pending(&self) -> bool {
        if !self.primed && self.rx.borrow().is_some() {
            return true;
        }
        self.rx.has_changed().unwrap_or(false)
    }

    /// Next value. Returns `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
        loop {
            self.rx.changed().await.ok()?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
        }
    }

    pub fn cancel(self) {}

    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send + Sync + 'static,
    {
        stream::unfold(self, |mut sub| async move {
            let value = sub.next().await?;
            Some((value, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn emits_current_value_then_updates() {
        let registry = ChannelRegistry::new();
        registry.publish("B1", 1.80_f64);

        let mut sub = registry.subscribe("B1", None);
        assert_eq!(sub.next().await, Some(1.80));
        assert!(!sub.has_pending());

        registry.publish("B1", 1.95);
        assert!(sub.has_pending());
        assert_eq!(sub.next().await, Some(1.95));
        assert!(!sub.has_pending());
    }

    #[tokio::test]
    async fn subscribe_before_first_value_waits() {
        let registry = ChannelRegistry::<f64>::new();
        let mut sub = registry.subscribe("B1", None);
        assert!(!sub.has_pending());

        let waited = tokio::time::timeout(Duration::from_millis(20), sub.next()).await;
        assert!(waited.is_err());

        registry.publish("B1", 2.10);
        assert_eq!(sub.next().await, Some(2.10));
    }

    #[test]
    fn publish_without_subscribers_never_blocks() {
        let registry = ChannelRegistry::new();
        for i in 0..10_000 {
            registry.publish("B1", i);
        }
        let sub = registry.subscribe("B1", None);
        assert_eq!(sub.current(), Some(9_999));
    }

    #[test]
    fn prune_removes_only_idle_channels() {
        let registry = ChannelRegistry::new();
        let kept = registry.subscribe("B1", Some(1));
        let dropped = registry.subscribe("B2", Some(2));
        registry.publish("B3", 3);
        dropped.cancel();

        assert_eq!(registry.prune_idle(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.subscriber_count("B1"), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn retracted_channel_reads_empty_until_next_publish() {
        let registry = ChannelRegistry::new();
        let mut sub = registry.subscribe("O1", Some(1.5_f64));
        assert_eq!(sub.next().await, Some(1.5));

        registry.retract("O1");
        registry.retract("O404");
        assert_eq!(sub.current(), None);
        assert_eq!(registry.len(), 1);

        registry.publish("O1", 2.0);
        assert_eq!(sub.next().await, Some(2.0));
    }

    #[tokio::test]
    async fn stream_yields_values() {
        let registry = ChannelRegistry::new();
        registry.publish("MK1", "open".to_string());
        let mut stream = Box::pin(registry.subscribe("MK1", None).into_stream());
        assert_eq!(stream.next().await.as_deref(), Some("open"));
        registry.publish("MK1", "closed".to_string());
        assert_eq!(stream.next().await.as_deref(), Some("closed"));
    }
}

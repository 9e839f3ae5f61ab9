use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// Latest-value broadcast with replay.
///
/// Every published value goes to all current subscribers. A new subscriber
/// first receives the cached value if it is younger than the freshness
/// window, then every later value.
pub struct Channel<T> {
    name: &'static str,
    latest: Mutex<Option<(T, Instant)>>,
    tx: broadcast::Sender<T>,
    freshness: Duration,
}

impl<T: Clone> Channel<T> {
    pub fn new(name: &'static str, capacity: usize, freshness: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name,
            latest: Mutex::new(None),
            tx,
            freshness,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cache `value` and deliver it to every subscriber.
    pub fn publish(&self, value: T) {
        let mut latest = self.latest.lock();
        *latest = Some((value.clone(), Instant::now()));
        // Sending under the lock keeps replay and live delivery in order.
        let _ = self.tx.send(value);
    }

    /// The cached value, if still fresh.
    pub fn latest(&self) -> Option<T> {
        let latest = self.latest.lock();
        self.fresh(&latest)
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let latest = self.latest.lock();
        Subscription {
            name: self.name,
            replay: self.fresh(&latest),
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Forget the cached value. Live subscribers are unaffected.
    pub fn clear(&self) {
        *self.latest.lock() = None;
    }

    fn fresh(&self, latest: &Option<(T, Instant)>) -> Option<T> {
        latest
            .as_ref()
            .filter(|(_, at)| at.elapsed() <= self.freshness)
            .map(|(value, _)| value.clone())
    }
}

/// Receiving side of a [`Channel`].
pub struct Subscription<T> {
    name: &'static str,
    replay: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next value, or `None` once the channel is gone.
    ///
    /// A subscriber that falls behind skips to the oldest value still buffered.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(channel = self.name, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn late_subscriber_gets_fresh_value() {
        let channel = Channel::new("pd", 8, Duration::from_secs(15));
        channel.publish(1u32);

        let mut sub = channel.subscribe();
        assert_eq!(sub.recv().await, Some(1));

        channel.publish(2);
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_value_is_not_replayed() {
        let channel = Channel::new("pd", 8, Duration::from_secs(15));
        channel.publish(1u32);
        tokio::time::advance(Duration::from_secs(16)).await;

        assert_eq!(channel.latest(), None);
        let mut sub = channel.subscribe();
        assert_eq!(sub.try_recv(), None);

        channel.publish(2);
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn fan_out_to_all_subscribers() {
        let channel = Channel::new("ems", 8, Duration::from_secs(15));
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 2);

        channel.publish("x");
        assert_eq!(a.recv().await, Some("x"));
        assert_eq!(b.recv().await, Some("x"));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let channel = Channel::new("bms", 2, Duration::from_secs(15));
        let mut sub = channel.subscribe();
        for i in 0..5u8 {
            channel.publish(i);
        }
        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.recv().await, Some(4));
    }

    #[tokio::test]
    async fn clear_drops_cached_value() {
        let channel = Channel::new("mppt", 4, Duration::from_secs(15));
        channel.publish(7u8);
        assert_eq!(channel.latest(), Some(7));
        channel.clear();
        assert_eq!(channel.latest(), None);
    }
}

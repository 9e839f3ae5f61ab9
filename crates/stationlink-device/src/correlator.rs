//! Request/response matching by routing key.
//!
//! The protocol has no request identifiers. A request registers the routing
//! keys its reply may arrive on and is resolved by the first inbound frame
//! carrying one of them. Concurrent requests waiting on the same key are all
//! resolved by that one frame.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stationlink_frame::{Frame, RoutingKey};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{DeviceError, Result};

struct Waiter {
    keys: Vec<RoutingKey>,
    tx: oneshot::Sender<Frame>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, Waiter>>,
}

/// Registry of in-flight requests.
#[derive(Clone, Default)]
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next frame carrying any of `keys`.
    ///
    /// The registration is removed when the returned handle is dropped.
    pub fn register(&self, keys: &[RoutingKey]) -> Pending {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.waiters.lock().insert(
            id,
            Waiter {
                keys: keys.to_vec(),
                tx,
            },
        );
        Pending {
            id,
            rx,
            owner: Arc::clone(&self.inner),
        }
    }

    /// Resolve every waiter matching `frame`. Returns how many were resolved.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        let mut waiters = self.inner.waiters.lock();
        let matched: Vec<u64> = waiters
            .iter()
            .filter(|(_, waiter)| waiter.keys.contains(&frame.key))
            .map(|(id, _)| *id)
            .collect();

        for id in &matched {
            if let Some(waiter) = waiters.remove(id) {
                let _ = waiter.tx.send(frame.clone());
            }
        }
        if !matched.is_empty() {
            trace!(key = %frame.key, resolved = matched.len(), "reply matched");
        }
        matched.len()
    }

    /// Register, perform `write`, then wait for the reply.
    ///
    /// `timeout` bounds the write and the wait together. A failed write is
    /// returned immediately. The registration is released on every path.
    pub async fn request<W>(
        &self,
        keys: &[RoutingKey],
        timeout: Duration,
        write: W,
    ) -> Result<Frame>
    where
        W: Future<Output = Result<()>>,
    {
        let pending = self.register(keys);
        let exchange = async move {
            write.await?;
            pending.wait().await
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DeviceError::Timeout(timeout))?
    }

    /// Fail every outstanding request with [`DeviceError::Closed`].
    pub fn cancel_all(&self) {
        self.inner.waiters.lock().clear();
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

/// One outstanding registration.
pub struct Pending {
    id: u64,
    rx: oneshot::Receiver<Frame>,
    owner: Arc<Inner>,
}

impl Pending {
    pub async fn wait(mut self) -> Result<Frame> {
        (&mut self.rx).await.map_err(|_| DeviceError::Closed)
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.owner.waiters.lock().remove(&self.id);
    }
}

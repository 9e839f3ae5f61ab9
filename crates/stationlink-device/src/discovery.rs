//! Extra battery discovery.
//!
//! Per-pack telemetry for a pack index without a known serial starts one
//! resolution: a serial query for the extra battery, answered on a routing
//! key that does not name the pack. Resolutions therefore run one at a time
//! behind a single lock, and at most one is outstanding per pack index.
//!
//! Each link loss starts a new epoch. A resolution that completes in an older
//! epoch is discarded so stale state never outlives the connection it was
//! learned on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stationlink_protocol::{Product, Snapshot};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::device::Shared;
use crate::secondary::SecondaryDevice;

/// Outcome of observing per-pack telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Observation {
    /// The pack is known; the snapshot went to its device.
    Delivered,
    /// The pack is unknown and nothing is resolving it. The caller must start
    /// a resolution for this epoch.
    Resolve { epoch: u64 },
    /// A resolution for the pack is already in flight; it will deliver the
    /// latest snapshot when it completes.
    Joined,
}

#[derive(Default)]
struct State {
    epoch: u64,
    /// Pack index to serial, for the current epoch.
    packs: HashMap<u8, String>,
    /// Pack index to the epoch of its in-flight resolution.
    in_flight: HashMap<u8, u64>,
    /// Latest snapshot seen for a pack still being resolved.
    pending: HashMap<u8, Arc<Snapshot>>,
    /// Every secondary device ever seen, by serial. Survives link loss.
    registry: HashMap<String, Arc<SecondaryDevice>>,
}

pub(crate) struct Discovery {
    enabled: bool,
    product: Product,
    capacity: usize,
    freshness: Duration,
    state: Mutex<State>,
    turn: tokio::sync::Mutex<()>,
    added: broadcast::Sender<Arc<SecondaryDevice>>,
}

impl Discovery {
    pub(crate) fn new(product: Product, capacity: usize, freshness: Duration) -> Self {
        let (added, _) = broadcast::channel(capacity.max(1));
        Self {
            enabled: product.discovers_secondary_packs(),
            product,
            capacity,
            freshness,
            state: Mutex::new(State::default()),
            turn: tokio::sync::Mutex::new(()),
            added,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn observe(&self, pack: u8, snapshot: Arc<Snapshot>) -> Observation {
        let device = {
            let mut state = self.state.lock();
            match state.packs.get(&pack) {
                Some(serial) => state.registry.get(serial).cloned(),
                None => {
                    state.pending.insert(pack, snapshot.clone());
                    if state.in_flight.contains_key(&pack) {
                        return Observation::Joined;
                    }
                    let epoch = state.epoch;
                    state.in_flight.insert(pack, epoch);
                    return Observation::Resolve { epoch };
                }
            }
        };

        if let Some(device) = device {
            device.bms().publish(snapshot);
        }
        Observation::Delivered
    }

    /// Serialize resolutions. Held across the serial query.
    pub(crate) async fn turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    /// Record a resolved serial for `pack`, creating or re-attaching its
    /// device. Returns the device, or `None` if the epoch has moved on.
    pub(crate) fn complete(
        &self,
        pack: u8,
        epoch: u64,
        serial: String,
        parent: &Arc<Shared>,
    ) -> Option<Arc<SecondaryDevice>> {
        let (device, created, snapshot) = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                debug!(pack, %serial, "discarding resolution from a previous connection");
                return None;
            }
            state.in_flight.remove(&pack);
            let snapshot = state.pending.remove(&pack);

            let (device, created) = match state.registry.get(&serial) {
                Some(device) => (Arc::clone(device), false),
                None => {
                    let device = Arc::new(SecondaryDevice::new(
                        serial.clone(),
                        self.product,
                        self.capacity,
                        self.freshness,
                    ));
                    state.registry.insert(serial.clone(), Arc::clone(&device));
                    (device, true)
                }
            };
            device.attach(parent);
            state.packs.insert(pack, serial.clone());
            (device, created, snapshot)
        };

        if created {
            info!(pack, %serial, "extra battery registered");
            let _ = self.added.send(Arc::clone(&device));
        } else {
            info!(pack, %serial, "extra battery re-attached");
        }
        if let Some(snapshot) = snapshot {
            device.bms().publish(snapshot);
        }
        Some(device)
    }

    /// Give up on `pack` after a failed resolution. The next telemetry event
    /// for it starts over.
    pub(crate) fn abandon(&self, pack: u8, epoch: u64) {
        let mut state = self.state.lock();
        if state.in_flight.get(&pack) == Some(&epoch) {
            state.in_flight.remove(&pack);
            state.pending.remove(&pack);
        }
    }

    /// Forget every pack mapping, start a new epoch and detach every mapped
    /// device. Returns the detached devices.
    pub(crate) fn clear(&self) -> Vec<Arc<SecondaryDevice>> {
        let detached: Vec<_> = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.in_flight.clear();
            state.pending.clear();
            let packs = std::mem::take(&mut state.packs);
            packs
                .values()
                .filter_map(|serial| state.registry.get(serial).cloned())
                .collect()
        };
        for device in &detached {
            device.detach();
        }
        detached
    }

    pub(crate) fn has_secondaries(&self) -> bool {
        !self.state.lock().packs.is_empty()
    }

    /// Currently mapped packs, ordered by index.
    pub(crate) fn secondaries(&self) -> Vec<(u8, Arc<SecondaryDevice>)> {
        let state = self.state.lock();
        let mut mapped: Vec<_> = state
            .packs
            .iter()
            .filter_map(|(pack, serial)| {
                state
                    .registry
                    .get(serial)
                    .map(|device| (*pack, Arc::clone(device)))
            })
            .collect();
        mapped.sort_by_key(|(pack, _)| *pack);
        mapped
    }

    pub(crate) fn subscribe_added(&self) -> broadcast::Receiver<Arc<SecondaryDevice>> {
        self.added.subscribe()
    }
}

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use stationlink_frame::Frame;
use stationlink_protocol::{Command, Product, Snapshot};
use tokio::sync::broadcast;

use crate::channel::Channel;
use crate::device::{Disconnect, Shared};
use crate::error::{DeviceError, Result};

/// An extra battery pack discovered through the main unit's telemetry.
///
/// All traffic goes through the main unit's connection. While the main unit
/// is disconnected the pack is detached and every operation fails with
/// [`DeviceError::Detached`].
pub struct SecondaryDevice {
    serial: String,
    product: Product,
    parent: RwLock<Option<Weak<Shared>>>,
    bms: Channel<Arc<Snapshot>>,
    disconnected: broadcast::Sender<Disconnect>,
}

impl SecondaryDevice {
    pub(crate) fn new(
        serial: String,
        product: Product,
        capacity: usize,
        freshness: Duration,
    ) -> Self {
        let (disconnected, _) = broadcast::channel(capacity.max(1));
        Self {
            serial,
            product,
            parent: RwLock::new(None),
            bms: Channel::new("extra_bms", capacity, freshness),
            disconnected,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn product(&self) -> Product {
        self.product
    }

    /// Display name, e.g. `RIVER Extra 123456`.
    pub fn name(&self) -> String {
        let tail = self
            .serial
            .char_indices()
            .rev()
            .nth(5)
            .map_or(self.serial.as_str(), |(i, _)| &self.serial[i..]);
        format!("{} Extra {tail}", self.product)
    }

    pub fn is_attached(&self) -> bool {
        self.parent().is_ok()
    }

    /// Serial of the main unit this pack is attached to.
    pub fn parent_serial(&self) -> Option<String> {
        self.parent().ok().map(|parent| parent.config.serial.clone())
    }

    /// Battery statistics of this pack.
    pub fn bms(&self) -> &Channel<Arc<Snapshot>> {
        &self.bms
    }

    pub fn subscribe_disconnect(&self) -> broadcast::Receiver<Disconnect> {
        self.disconnected.subscribe()
    }

    pub async fn send(&self, command: &Command) -> Result<()> {
        self.parent()?.send(command).await
    }

    pub async fn request(&self, command: &Command) -> Result<Frame> {
        self.parent()?.request(command, &[command.key]).await
    }

    pub(crate) fn attach(&self, parent: &Arc<Shared>) {
        *self.parent.write() = Some(Arc::downgrade(parent));
    }

    pub(crate) fn detach(&self) {
        *self.parent.write() = None;
        let _ = self.disconnected.send(Disconnect::ALL);
    }

    fn parent(&self) -> Result<Arc<Shared>> {
        self.parent
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| DeviceError::Detached {
                serial: self.serial.clone(),
            })
    }
}

impl std::fmt::Debug for SecondaryDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryDevice")
            .field("serial", &self.serial)
            .field("product", &self.product)
            .field("attached", &self.is_attached())
            .finish()
    }
}

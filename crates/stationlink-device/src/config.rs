use std::time::Duration;

use serde::{Deserialize, Serialize};
use stationlink_frame::HeaderVariant;
use stationlink_protocol::Product;

/// Runtime settings for one [`crate::MainDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Product code; selects payload layouts and command routing.
    pub product: Product,
    /// Serial number of the main unit, used for logging and display.
    pub serial: String,
    /// Header variant of outgoing commands and expected inbound frames.
    pub variant: HeaderVariant,
    /// Expected telemetry cadence. Also bounds how stale a replayed value can be.
    pub silence_window: Duration,
    /// Extra time past the silence window before the link is declared dead.
    pub liveness_grace: Duration,
    pub request_timeout: Duration,
    /// Buffer depth of every broadcast stream.
    pub channel_capacity: usize,
}

impl DeviceConfig {
    pub fn new(product: Product, serial: impl Into<String>) -> Self {
        Self {
            product,
            serial: serial.into(),
            ..Self::default()
        }
    }

    pub fn with_variant(mut self, variant: HeaderVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_silence_window(mut self, window: Duration) -> Self {
        self.silence_window = window;
        self
    }

    /// Inactivity after which the link is considered dead.
    pub fn liveness_deadline(&self) -> Duration {
        self.silence_window + self.liveness_grace
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            product: Product(0),
            serial: String::new(),
            variant: HeaderVariant::V2,
            silence_window: Duration::from_secs(15),
            liveness_grace: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            channel_capacity: 64,
        }
    }
}

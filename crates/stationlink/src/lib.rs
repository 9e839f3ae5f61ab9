//! Local-network client for portable power stations.
//!
//! stationlink talks to a power station over its LAN TCP port: it frames and
//! checksums commands, keeps the connection alive, decodes telemetry into
//! named fields, and discovers extra battery packs attached to the main unit.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire codec and stream reassembly
//! - [`transport`]: reconnecting TCP link
//! - [`protocol`]: product catalog, telemetry layouts and command encoders
//! - [`device`]: device runtime with telemetry channels, requests, liveness and discovery

/// Re-export frame types.
pub mod frame {
    pub use stationlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use stationlink_transport::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use stationlink_protocol::*;
}

/// Re-export device runtime types.
pub mod device {
    pub use stationlink_device::*;
}

pub use stationlink_device::{DeviceConfig, DeviceError, MainDevice, SecondaryDevice};
pub use stationlink_protocol::{command, Product};
pub use stationlink_transport::TransportConfig;

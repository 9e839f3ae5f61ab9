//! Device runtime for portable power stations.
//!
//! [`MainDevice`] drives one link: it reassembles frames, correlates replies
//! with outstanding requests, publishes decoded telemetry on replaying
//! [`Channel`]s, watches for silence, and discovers extra battery packs that
//! report through the main unit.
//!
//! ```no_run
//! # async fn demo() -> stationlink_device::Result<()> {
//! use stationlink_device::{DeviceConfig, MainDevice};
//! use stationlink_protocol::{command, Product};
//! use stationlink_transport::TransportConfig;
//!
//! let device = MainDevice::connect(
//!     DeviceConfig::new(Product::DELTA_MAX, "DAEBZ5ZE1234567"),
//!     TransportConfig::new("192.168.1.20"),
//! );
//! let mut pd = device.telemetry().pd().subscribe();
//! device.send(&command::get_pd()).await?;
//! if let Some(snapshot) = pd.recv().await {
//!     println!("battery {:?}%", snapshot.u64("battery_level"));
//! }
//! device.close().await;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod correlator;
pub mod device;
mod discovery;
pub mod error;
pub mod liveness;
pub mod secondary;
pub mod telemetry;

pub use channel::{Channel, Subscription};
pub use config::DeviceConfig;
pub use correlator::{Correlator, Pending};
pub use device::{Diagnostics, Disconnect, MainDevice, Update};
pub use error::{DeviceError, Result};
pub use liveness::Liveness;
pub use secondary::SecondaryDevice;
pub use telemetry::{Routed, Telemetry};

//! Self-healing TCP link to a power station.
//!
//! The appliance exposes its command/telemetry protocol on a plain TCP port.
//! [`ReconnectingTransport`] keeps one connection alive forever: it connects,
//! forwards raw byte chunks, reconnects after any failure with a fixed backoff,
//! and only stops when explicitly closed.
//!
//! Higher layers depend on the [`Link`] trait rather than the TCP type so the
//! device runtime can be driven by an in-memory link in tests.

pub mod config;
pub mod error;
pub mod tcp;
pub mod traits;

pub use config::{TransportConfig, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use tcp::ReconnectingTransport;
pub use traits::{Link, LinkEvent, TransportState};

//! Product knowledge for the power-station protocol.
//!
//! The wire layer only knows routing keys and opaque payloads. This crate
//! knows what they mean: which product family a product code belongs to,
//! which routing keys carry which telemetry channel, how each family lays
//! out its telemetry payloads, and how to build every supported command.
//!
//! Parsing never fails for telemetry tables. A product family without a
//! layout for a channel yields an empty [`Snapshot`] so the rest of the
//! pipeline keeps running.

pub mod command;
pub mod error;
pub mod layout;
pub mod parse;
pub mod product;
pub mod tables;
pub mod value;

pub use command::Command;
pub use error::{ProtocolError, Result};
pub use parse::{ChannelKind, SerialInfo};
pub use product::{Product, ProductFamily};
pub use value::{FieldValue, Snapshot};

//! Checksummed command frames for portable power stations.
//!
//! This is the wire layer of stationlink. Every frame carries:
//! - A 2-byte magic (`0xAA`, header version) for stream synchronization
//! - A 2-byte little-endian payload length guarded by a CRC-8
//! - Reserved bytes holding sequence and obfuscation flags
//! - A routing triple (module, command set, command id)
//! - The payload and a trailing CRC-16 over everything before it
//!
//! Decoding is pure. Corrupt input is reported as a value so callers can
//! resynchronize; nothing in this crate panics on bad bytes.

pub mod assembler;
pub mod codec;
pub mod crc;
pub mod error;
pub mod routing;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, encode, encode_frame, encode_obfuscated, Frame, FrameConfig, HeaderVariant,
    APP_ADDRESS, MAGIC,
};
pub use error::{FrameError, Result};
pub use routing::RoutingKey;

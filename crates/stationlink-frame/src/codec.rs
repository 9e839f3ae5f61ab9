use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::crc::{crc16, crc8};
use crate::error::{FrameError, Result};
use crate::routing::RoutingKey;

/// First magic byte shared by every header variant.
pub const MAGIC: u8 = 0xAA;

/// Address of the controlling app on the device bus.
pub const APP_ADDRESS: u8 = 0x20;

/// Byte holding the obfuscation flag bits (bits 5..6).
const FLAGS_OFFSET: usize = 5;
/// Byte holding the XOR key when obfuscation is flagged.
const XOR_KEY_OFFSET: usize = 6;
const SRC_OFFSET: usize = 12;
const DST_OFFSET: usize = 13;

/// Flags byte emitted by the app for plain frames.
const DEFAULT_FLAGS: u8 = 0x0D;
const OBFUSCATION_MASK: u8 = 0b0110_0000;
const OBFUSCATION_XOR: u8 = 0b0010_0000;

/// Prefix covered by the header CRC-8: magic (2) + length (2).
const PREFIX_LEN: usize = 4;
const CHECKSUM_LEN: usize = 2;

/// Header layout generation.
///
/// Both variants share bytes 0-13. V3 firmware inserts two reserved bytes
/// before the command set/id pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderVariant {
    #[default]
    V2,
    V3,
}

impl HeaderVariant {
    /// Version byte following [`MAGIC`].
    pub const fn version(self) -> u8 {
        match self {
            Self::V2 => 0x02,
            Self::V3 => 0x03,
        }
    }

    pub const fn from_version(version: u8) -> Option<Self> {
        match version {
            0x02 => Some(Self::V2),
            0x03 => Some(Self::V3),
            _ => None,
        }
    }

    /// The two magic bytes that open a frame of this variant.
    pub const fn magic(self) -> [u8; 2] {
        [MAGIC, self.version()]
    }

    /// Bytes before the payload.
    pub const fn header_len(self) -> usize {
        match self {
            Self::V2 => 16,
            Self::V3 => 18,
        }
    }

    /// Header plus trailing checksum: the size of a frame with an empty payload.
    pub const fn overhead(self) -> usize {
        self.header_len() + CHECKSUM_LEN
    }

    const fn command_offset(self) -> usize {
        self.header_len() - 2
    }
}

/// A validated, de-obfuscated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub key: RoutingKey,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(key: RoutingKey, payload: impl Into<Bytes>) -> Self {
        Self {
            key,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame for a header variant.
    pub fn wire_size(&self, variant: HeaderVariant) -> usize {
        variant.overhead() + self.payload.len()
    }
}

/// Configuration for frame encoding and reassembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Header variant emitted by the encoder and expected by the reassembler.
    pub variant: HeaderVariant,
}

/// Encode a command frame into the wire format.
///
/// ```text
/// bytes 0-1   0xAA, version
/// bytes 2-3   payload length (LE)
/// byte  4     CRC-8 over bytes 0-3
/// bytes 5-11  flags / obfuscation key / sequence (reserved)
/// byte  12    source (app = 0x20)
/// byte  13    destination module
/// [V3 only: 2 reserved bytes]
/// next 2      command set, command id
/// ...         payload
/// last 2      CRC-16 over all preceding bytes (LE)
/// ```
pub fn encode_frame(
    variant: HeaderVariant,
    key: RoutingKey,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    write_frame(variant, key, DEFAULT_FLAGS, 0, payload, dst)
}

/// Encode a frame whose payload is XOR-obfuscated with `xor_key`.
///
/// The app never needs to send these; devices do. This exists so the
/// decoder's de-obfuscation path can be exercised against known frames.
pub fn encode_obfuscated(
    variant: HeaderVariant,
    key: RoutingKey,
    xor_key: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let flags = (DEFAULT_FLAGS & !OBFUSCATION_MASK) | OBFUSCATION_XOR;
    let masked: Vec<u8> = payload.iter().map(|b| b ^ xor_key).collect();
    write_frame(variant, key, flags, xor_key, &masked, dst)
}

/// Encode a frame into a fresh buffer.
pub fn encode(variant: HeaderVariant, key: RoutingKey, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(variant.overhead() + payload.len());
    encode_frame(variant, key, payload, &mut buf)?;
    Ok(buf.freeze())
}

fn write_frame(
    variant: HeaderVariant,
    key: RoutingKey,
    flags: u8,
    xor_key: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        });
    }

    let start = dst.len();
    dst.reserve(variant.overhead() + payload.len());
    dst.put_slice(&variant.magic());
    dst.put_u16_le(payload.len() as u16);
    let header_crc = crc8(&dst[start..start + PREFIX_LEN]);
    dst.put_u8(header_crc);
    dst.put_u8(flags);
    dst.put_u8(xor_key);
    dst.put_bytes(0, 5);
    dst.put_u8(APP_ADDRESS);
    dst.put_u8(key.dest);
    if variant == HeaderVariant::V3 {
        dst.put_bytes(0, 2);
    }
    dst.put_u8(key.command_set);
    dst.put_u8(key.command_id);
    dst.put_slice(payload);
    let body_crc = crc16(&dst[start..]);
    dst.put_u16_le(body_crc);
    Ok(())
}

/// Validate and decode exactly one frame.
///
/// The header variant is taken from the version byte. Both checksums are
/// recomputed; an obfuscated payload is XORed back with the key byte from the
/// reserved region before it is returned.
pub fn decode_frame(raw: &[u8]) -> Result<Frame> {
    if raw.len() < 2 {
        return Err(FrameError::Truncated {
            len: raw.len(),
            min: HeaderVariant::V2.overhead(),
        });
    }
    let variant = match HeaderVariant::from_version(raw[1]) {
        Some(variant) if raw[0] == MAGIC => variant,
        _ => {
            return Err(FrameError::InvalidMagic {
                expected: HeaderVariant::V2.magic(),
                found: [raw[0], raw[1]],
            })
        }
    };

    check_frame(raw, variant)?;

    let header_len = variant.header_len();
    let payload_len = declared_len(raw);
    let body = &raw[header_len..header_len + payload_len];

    let flags = raw[FLAGS_OFFSET];
    let payload = if flags & OBFUSCATION_MASK == OBFUSCATION_XOR {
        let xor_key = raw[XOR_KEY_OFFSET];
        Bytes::from(body.iter().map(|b| b ^ xor_key).collect::<Vec<u8>>())
    } else {
        Bytes::copy_from_slice(body)
    };

    let (src, dst) = (raw[SRC_OFFSET], raw[DST_OFFSET]);
    let module = if src == APP_ADDRESS { dst } else { src };
    let command = variant.command_offset();
    let key = RoutingKey::new(module, raw[command], raw[command + 1]);

    Ok(Frame { key, payload })
}

/// Payload length declared in bytes 2-3. Caller guarantees `raw.len() >= 4`.
pub(crate) fn declared_len(raw: &[u8]) -> usize {
    u16::from_le_bytes([raw[2], raw[3]]) as usize
}

/// Header CRC-8 check. Caller guarantees `raw.len() >= 5`.
pub(crate) fn check_header(raw: &[u8]) -> Result<()> {
    let computed = crc8(&raw[..PREFIX_LEN]);
    let found = raw[PREFIX_LEN];
    if computed != found {
        return Err(FrameError::HeaderChecksum { computed, found });
    }
    Ok(())
}

/// Body CRC-16 check over a slice holding exactly one frame.
pub(crate) fn check_body(raw: &[u8]) -> Result<()> {
    let split = raw.len() - CHECKSUM_LEN;
    let computed = crc16(&raw[..split]);
    let found = u16::from_le_bytes([raw[split], raw[split + 1]]);
    if computed != found {
        return Err(FrameError::BodyChecksum { computed, found });
    }
    Ok(())
}

fn check_frame(raw: &[u8], variant: HeaderVariant) -> Result<()> {
    let min = variant.overhead();
    if raw.len() < min {
        return Err(FrameError::Truncated {
            len: raw.len(),
            min,
        });
    }
    let declared = declared_len(raw);
    if raw.len() != min + declared {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: raw.len(),
        });
    }
    check_header(raw)?;
    check_body(raw)
}

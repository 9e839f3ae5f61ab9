/// Reasons a byte sequence is not a valid frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The first two bytes are not the expected magic for the header variant.
    #[error("invalid frame magic {found:02x?} (expected {expected:02x?})")]
    InvalidMagic { expected: [u8; 2], found: [u8; 2] },

    /// Fewer bytes than the fixed frame overhead.
    #[error("truncated frame ({len} bytes, need at least {min})")]
    Truncated { len: usize, min: usize },

    /// The declared payload length does not match the bytes supplied.
    #[error("frame length mismatch (declared {declared} payload bytes, frame is {actual} bytes)")]
    LengthMismatch { declared: usize, actual: usize },

    /// CRC-8 over the magic and length bytes does not match.
    #[error("header checksum mismatch (computed {computed:#04x}, frame has {found:#04x})")]
    HeaderChecksum { computed: u8, found: u8 },

    /// CRC-16 over the frame body does not match.
    #[error("body checksum mismatch (computed {computed:#06x}, frame has {found:#06x})")]
    BodyChecksum { computed: u16, found: u16 },

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

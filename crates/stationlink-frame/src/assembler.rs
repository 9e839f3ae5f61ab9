use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{
    check_body, check_header, decode_frame, declared_len, Frame, FrameConfig, HeaderVariant,
};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Counters describing what the assembler has seen since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Complete, validated frames emitted.
    pub frames: u64,
    /// Bytes discarded while resynchronizing.
    pub dropped_bytes: u64,
    /// Session boundaries observed.
    pub resets: u64,
}

/// Turns arbitrary byte chunks into validated frames.
///
/// Bytes are buffered until a whole frame is present. Garbage before a frame
/// is skipped one byte at a time; a frame whose header or body checksum fails
/// is skipped past its magic and the scan continues.
pub struct FrameAssembler {
    buf: BytesMut,
    variant: HeaderVariant,
    stats: AssemblerStats,
}

impl FrameAssembler {
    /// Create an assembler expecting frames of one header variant.
    pub fn new(variant: HeaderVariant) -> Self {
        Self::with_config(FrameConfig { variant })
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            variant: config.variant,
            stats: AssemblerStats::default(),
        }
    }

    /// Append a raw chunk from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Append a chunk and drain every frame it completes, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.push(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Extract the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let min = self.variant.overhead();
        let magic = self.variant.magic();

        while self.buf.len() >= min {
            if self.buf[..2] != magic {
                self.discard(1);
                continue;
            }

            let total = min + declared_len(&self.buf);
            if self.buf.len() < total {
                return None;
            }

            if let Err(err) = check_header(&self.buf) {
                trace!(%err, "resynchronizing");
                self.discard(2);
                continue;
            }
            if let Err(err) = check_body(&self.buf[..total]) {
                trace!(%err, "resynchronizing");
                self.discard(2);
                continue;
            }

            let raw = self.buf.split_to(total);
            match decode_frame(&raw) {
                Ok(frame) => {
                    self.stats.frames += 1;
                    trace!(key = %frame.key, len = frame.payload.len(), "frame assembled");
                    return Some(frame);
                }
                Err(err) => {
                    debug!(%err, "checksummed frame failed to decode");
                    self.stats.dropped_bytes += raw.len() as u64;
                }
            }
        }

        None
    }

    /// Session boundary: forget any partial frame from the previous connection.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            debug!(bytes = self.buf.len(), "discarding partial data at session boundary");
        }
        self.stats.dropped_bytes += self.buf.len() as u64;
        self.stats.resets += 1;
        self.buf.clear();
    }

    /// Bytes currently waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn variant(&self) -> HeaderVariant {
        self.variant
    }

    fn discard(&mut self, count: usize) {
        self.buf.advance(count);
        self.stats.dropped_bytes += count as u64;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::with_config(FrameConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode, encode_frame, encode_obfuscated};
    use crate::routing::RoutingKey;

    const PD: RoutingKey = RoutingKey::new(2, 32, 2);
    const EMS: RoutingKey = RoutingKey::new(3, 32, 2);

    fn wire(key: RoutingKey, payload: &[u8]) -> Vec<u8> {
        encode(HeaderVariant::V2, key, payload).unwrap().to_vec()
    }

    #[test]
    fn single_frame() {
        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&wire(PD, b"hello"));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].key, PD);
        assert_eq!(frames[0].payload.as_ref(), b"hello");
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut bytes = wire(PD, b"one");
        bytes.extend(wire(EMS, b"two"));
        bytes.extend(wire(PD, b""));

        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&bytes);

        let keys: Vec<_> = frames.iter().map(|f| f.key).collect();
        assert_eq!(keys, vec![PD, EMS, PD]);
        assert_eq!(frames[1].payload.as_ref(), b"two");
        assert_eq!(asm.stats().frames, 3);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let bytes = wire(EMS, b"slow link");
        let mut asm = FrameAssembler::default();

        let mut frames = Vec::new();
        for b in &bytes {
            frames.extend(asm.feed(std::slice::from_ref(b)));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"slow link");
    }

    #[test]
    fn waits_for_declared_payload() {
        let bytes = wire(PD, &[7u8; 40]);
        let mut asm = FrameAssembler::default();

        assert!(asm.feed(&bytes[..30]).is_empty());
        assert_eq!(asm.buffered(), 30);
        let frames = asm.feed(&bytes[30..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.len(), 40);
    }

    #[test]
    fn garbage_prefix_is_skipped() {
        let mut bytes = vec![0x01, 0xAA, 0x7F, 0x00, 0x13];
        bytes.extend(wire(PD, b"payload"));

        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"payload");
        assert_eq!(asm.buffered(), 0);
        assert_eq!(asm.stats().dropped_bytes, 5);

        // Nothing left to emit, nothing stalled.
        assert!(asm.next_frame().is_none());
    }

    #[test]
    fn recovers_after_corrupt_body() {
        let mut bad = wire(PD, b"corrupted");
        let last = bad.len() - 3;
        bad[last] ^= 0x40;
        let mut bytes = bad;
        bytes.extend(wire(EMS, b"intact"));

        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].key, EMS);
        assert_eq!(frames[0].payload.as_ref(), b"intact");
    }

    #[test]
    fn recovers_after_corrupt_header_checksum() {
        let mut bad = wire(PD, b"abc");
        bad[4] ^= 0x01;
        let mut bytes = bad;
        bytes.extend(wire(EMS, b"next"));

        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].key, EMS);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let bytes = wire(PD, b"partial frame");
        let mut asm = FrameAssembler::default();
        assert!(asm.feed(&bytes[..20]).is_empty());

        asm.reset();
        assert_eq!(asm.buffered(), 0);

        // The tail of the old frame is garbage now; the next full frame still parses.
        let mut next = bytes[20..].to_vec();
        next.extend(wire(EMS, b"fresh"));
        let frames = asm.feed(&next);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"fresh");
        assert_eq!(asm.stats().resets, 1);
    }

    #[test]
    fn obfuscated_frames_are_decoded() {
        let mut buf = BytesMut::new();
        encode_obfuscated(HeaderVariant::V2, PD, 0x33, b"secret", &mut buf).unwrap();

        let mut asm = FrameAssembler::default();
        let frames = asm.feed(&buf);
        assert_eq!(frames[0].payload.as_ref(), b"secret");
    }

    #[test]
    fn v3_assembler_ignores_v2_frames() {
        let mut buf = BytesMut::new();
        encode_frame(HeaderVariant::V2, PD, b"old", &mut buf).unwrap();
        encode_frame(HeaderVariant::V3, EMS, b"new", &mut buf).unwrap();

        let mut asm = FrameAssembler::new(HeaderVariant::V3);
        let frames = asm.feed(&buf);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].key, EMS);
        assert_eq!(frames[0].payload.as_ref(), b"new");
    }
}

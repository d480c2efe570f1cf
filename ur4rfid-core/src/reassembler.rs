//! Byte-stream reassembler
//!
//! Accumulates the serial byte trickle in a `BytesMut` and yields complete
//! frames, resynchronising one byte at a time over garbage.
//!
//! # Example
//!
//! ```
//! use ur4rfid_core::{Command, Frame, Reassembler};
//!
//! let encoded = Frame::empty(Command::GetPower).encode();
//! let mut stream = Reassembler::new();
//!
//! stream.feed(&[0x00, 0xFF]);
//! stream.feed(&encoded[..3]);
//! assert_eq!(stream.drain().count(), 0);
//!
//! stream.feed(&encoded[3..]);
//! let frames: Vec<Frame> = stream.drain().collect();
//! assert_eq!(frames.len(), 1);
//! assert!(stream.is_empty());
//! ```

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::constants::MAX_FRAME_LEN;
use crate::frame::{Decoded, Frame};

/// Frame reassembly buffer
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: BytesMut,
    discarded: u64,
}

impl Reassembler {
    /// Create an empty reassembler
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_LEN),
            discarded: 0,
        }
    }

    /// Append newly read bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode every complete frame currently buffered
    ///
    /// The iterator stops at the first incomplete frame; feeding more bytes
    /// and draining again continues where it left off.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { stream: self }
    }

    /// Discard all buffered bytes
    pub fn clear(&mut self) {
        self.discarded += self.buffer.len() as u64;
        self.buffer.clear();
    }

    /// Bytes waiting for the rest of a frame
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes dropped as noise or by `clear`
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// Lazy sequence of frames drained from a [`Reassembler`]
pub struct Drain<'a> {
    stream: &'a mut Reassembler,
}

impl Iterator for Drain<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            match Frame::decode(&self.stream.buffer) {
                Decoded::Frame { frame, consumed } => {
                    self.stream.buffer.advance(consumed);
                    trace!("Reassembled {}", frame);
                    return Some(frame);
                }
                Decoded::NeedMoreData => return None,
                Decoded::Corrupt { skip, reason } => {
                    trace!(?reason, skip, "Skipping corrupt bytes");
                    self.stream.buffer.advance(skip);
                    self.stream.discarded += skip as u64;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn power_response() -> Frame {
        Frame::new(Command::GetPowerResponse, vec![0x00, 0x01, 0x0B, 0xB8, 0x0B, 0xB8]).unwrap()
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let mut stream = Reassembler::new();
        let first = Frame::empty(Command::GetPower);
        let second = power_response();

        let mut bytes = first.encode();
        bytes.extend_from_slice(&second.encode());
        stream.feed(&bytes);

        let frames: Vec<Frame> = stream.drain().collect();
        assert_eq!(frames, vec![first, second]);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_byte_by_byte_feed() {
        let mut stream = Reassembler::new();
        let frame = power_response();
        let encoded = frame.encode();

        let mut frames = Vec::new();
        for byte in encoded.iter() {
            stream.feed(&[*byte]);
            frames.extend(stream.drain());
        }

        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn test_corrupt_frame_followed_by_valid_frame() {
        let mut stream = Reassembler::new();
        let mut bad = power_response().encode();
        let last = bad.len() - 4;
        bad[last] ^= 0x40;

        stream.feed(&bad);
        stream.feed(&Frame::empty(Command::GetAntenna).encode());

        let frames: Vec<Frame> = stream.drain().collect();
        assert_eq!(frames, vec![Frame::empty(Command::GetAntenna)]);
        assert_eq!(stream.discarded(), bad.len() as u64);
    }

    #[test]
    fn test_partial_frame_is_kept() {
        let mut stream = Reassembler::new();
        let encoded = power_response().encode();

        stream.feed(&encoded[..6]);
        assert_eq!(stream.drain().next(), None);
        assert_eq!(stream.len(), 6);

        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.discarded(), 6);
    }

    proptest! {
        #[test]
        fn prop_garbage_then_frame_resyncs(garbage in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut stream = Reassembler::new();
            let frame = power_response();

            stream.feed(&garbage);
            let mut frames: Vec<Frame> = stream.drain().collect();
            stream.feed(&frame.encode());
            frames.extend(stream.drain());

            // A garbage tail that looks like a header with a long length
            // holds the frame back until that many bytes have arrived;
            // idle-line zeros complete it.
            stream.feed(&[0u8; MAX_FRAME_LEN]);
            frames.extend(stream.drain());

            prop_assert_eq!(frames, vec![frame]);
            prop_assert!(stream.is_empty());
        }
    }
}

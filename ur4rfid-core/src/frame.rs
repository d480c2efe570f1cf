//! UR4 wire frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{FRAME_HEADER, FRAME_OVERHEAD, FRAME_TRAILER, MAX_FRAME_LEN, MIN_FRAME_LEN},
    error::{Error, Result},
};

/// UR4 protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌───────────┬───────────┬─────────┬──────────┬─────────┬───────────┐
/// │  Header   │  Length   │ Command │   Data   │   BCC   │  Trailer  │
/// │  C8 8C    │ (BE u16)  │ 1 byte  │ N bytes  │ 1 byte  │  0D 0A    │
/// └───────────┴───────────┴─────────┴──────────┴─────────┴───────────┘
/// ```
///
/// `Length` counts the whole frame (`8 + N`). `BCC` is the XOR of the
/// length, command and data bytes.
///
/// # Examples
///
/// ```
/// use ur4rfid_core::{Command, Frame};
/// use ur4rfid_core::frame::Decoded;
///
/// let frame = Frame::empty(Command::GetPower);
/// let encoded = frame.encode();
/// assert_eq!(&encoded[..], &[0xC8, 0x8C, 0x00, 0x08, 0x12, 0x1A, 0x0D, 0x0A]);
///
/// match Frame::decode(&encoded) {
///     Decoded::Frame { frame: decoded, consumed } => {
///         assert_eq!(decoded, frame);
///         assert_eq!(consumed, 8);
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    command: u8,
    data: Bytes,
}

/// Why a candidate frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// Buffer does not start with `C8 8C`
    BadHeader,

    /// Length field outside `[8, 4096]`
    BadLength(u16),

    /// Last two bytes are not `0D 0A`
    BadTrailer,

    /// BCC does not match the frame contents
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },
}

/// Outcome of decoding the front of a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, checksum-correct frame and the bytes it occupied
    Frame {
        frame: Frame,
        consumed: usize,
    },

    /// The buffer holds a possible frame prefix
    NeedMoreData,

    /// The front of the buffer is not a valid frame; drop `skip` bytes and retry
    Corrupt {
        skip: usize,
        reason: Corruption,
    },
}

impl Decoded {
    fn corrupt(reason: Corruption) -> Self {
        // The real frame boundary is unknown, so resync one byte at a time
        Self::Corrupt { skip: 1, reason }
    }
}

impl Frame {
    /// Maximum data size the 16-bit length field can describe
    pub const MAX_DATA_SIZE: usize = u16::MAX as usize - FRAME_OVERHEAD;

    /// Create a frame with data
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrameSize` if `8 + data.len()` exceeds `u16::MAX`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ur4rfid_core::{Command, Frame};
    ///
    /// let frame = Frame::new(Command::StartInventory, vec![0x00, 0x00]).unwrap();
    /// assert_eq!(frame.wire_len(), 10);
    /// ```
    pub fn new(command: impl Into<u8>, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();

        if data.len() > Self::MAX_DATA_SIZE {
            return Err(Error::InvalidFrameSize {
                size: data.len() + FRAME_OVERHEAD,
                max: u16::MAX as usize,
            });
        }

        Ok(Self {
            command: command.into(),
            data,
        })
    }

    /// Create a frame without data
    pub fn empty(command: impl Into<u8>) -> Self {
        Self {
            command: command.into(),
            data: Bytes::new(),
        }
    }

    pub(crate) fn from_static(command: Command, data: &'static [u8]) -> Self {
        debug_assert!(data.len() <= Self::MAX_DATA_SIZE);
        Self {
            command: command.into(),
            data: Bytes::from_static(data),
        }
    }

    /// Raw command byte
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Known command, if the byte maps to one
    pub fn kind(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    /// Check the command byte against a known command
    pub fn is(&self, command: Command) -> bool {
        self.command == u8::from(command)
    }

    /// Data bytes between command and BCC
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Total encoded size, also the value of the length field
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.data.len()
    }

    fn length_field(&self) -> [u8; 2] {
        (self.wire_len() as u16).to_be_bytes()
    }

    /// Calculate BCC for this frame
    pub fn checksum(&self) -> u8 {
        let [hi, lo] = self.length_field();
        checksum::calculate(&[hi, lo, self.command]) ^ checksum::calculate(&self.data)
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.wire_len());

        buf.put_slice(&FRAME_HEADER);
        buf.put_slice(&self.length_field());
        buf.put_u8(self.command);
        buf.put_slice(&self.data);
        buf.put_u8(self.checksum());
        buf.put_slice(&FRAME_TRAILER);

        buf
    }

    /// Decode a frame from the front of `buf`
    ///
    /// Never consumes anything itself; the caller drops `consumed` bytes on
    /// success or `skip` bytes on corruption.
    pub fn decode(buf: &[u8]) -> Decoded {
        match buf {
            [] => return Decoded::NeedMoreData,
            [first] if *first == FRAME_HEADER[0] => return Decoded::NeedMoreData,
            [_] => return Decoded::corrupt(Corruption::BadHeader),
            [a, b, ..] if [*a, *b] != FRAME_HEADER => {
                return Decoded::corrupt(Corruption::BadHeader);
            }
            _ => {}
        }

        if buf.len() < 4 {
            return Decoded::NeedMoreData;
        }

        let length = u16::from_be_bytes([buf[2], buf[3]]);
        let len = usize::from(length);

        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
            return Decoded::corrupt(Corruption::BadLength(length));
        }

        if buf.len() < len {
            return Decoded::NeedMoreData;
        }

        let candidate = &buf[..len];

        if candidate[len - 2..] != FRAME_TRAILER {
            return Decoded::corrupt(Corruption::BadTrailer);
        }

        let received = candidate[len - 3];
        let expected = checksum::calculate(&candidate[2..len - 3]);
        if expected != received {
            return Decoded::corrupt(Corruption::ChecksumMismatch { expected, received });
        }

        Decoded::Frame {
            frame: Self {
                command: candidate[4],
                data: Bytes::copy_from_slice(&candidate[5..len - 3]),
            },
            consumed: len,
        }
    }
}

/// Encode a command and data into wire bytes
///
/// # Errors
///
/// Returns `InvalidFrameSize` when the data does not fit the length field.
pub fn encode(command: impl Into<u8>, data: &[u8]) -> Result<BytesMut> {
    Ok(Frame::new(command, Bytes::copy_from_slice(data))?.encode())
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &format!("0x{:02X}", self.command))
            .field("length", &self.wire_len())
            .field("checksum", &format!("0x{:02X}", self.checksum()))
            .field("data", &hex::encode_upper(&self.data))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(command) => write!(f, "Frame[{}](len={})", command, self.wire_len()),
            None => write!(f, "Frame[0x{:02X}](len={})", self.command, self.wire_len()),
        }
    }
}

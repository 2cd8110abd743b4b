//! Length-prefixed frame codec for the encrypted transport.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! Noise ciphertext:
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Ciphertext       |
//! +----------------------------+------------------+
//! ```
//!
//! The length is validated before any allocation, and the ceiling is the
//! 4 KiB plaintext maximum plus the AEAD tag, so a hostile peer cannot make
//! the codec reserve unbounded memory or smuggle an oversized message past
//! the padding discipline.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::session::MAX_WIRE_FRAME;
use super::TransportError;

/// Length of the frame header.
const HEADER_LEN: usize = 4;

/// Frame codec used with [`tokio_util::codec::Framed`] under the Noise
/// session.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Creates a codec with the protocol's frame ceiling.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: MAX_WIRE_FRAME,
        }
    }

    /// Returns the frame ceiling.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, TransportError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Validate before reserving anything.
        if length > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        let total = HEADER_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), TransportError> {
        if item.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        dst.reserve(HEADER_LEN + item.len());
        #[allow(clippy::cast_possible_truncation)] // validated against the ceiling
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

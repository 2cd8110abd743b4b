//! Fixed-envelope padding codec.
//!
//! Every request is padded to a constant size per flow (256 bytes for
//! lookups, 4 KiB for updates) before it is encrypted and framed, and every
//! reply is padded to the size the request asked for via `pad_reply_to`.
//! The envelope sizes dominate the realistic message size distribution for
//! their flow, so an observer learns nothing from frame lengths beyond
//! which flow is in use.
//!
//! The scheme is the classic `0x80`-terminator padding: append `0x80`, then
//! zero bytes up to the target length. Unpadding strips trailing zeros and
//! then requires the `0x80` terminator; a buffer without one is malformed,
//! not empty.

use thiserror::Error;

/// Envelope size for lookup requests.
pub const LOOKUP_REQUEST_SIZE: usize = 256;

/// Envelope size for update requests, and the reply envelope clients ask
/// for via `pad_reply_to`.
pub const UPDATE_REQUEST_SIZE: usize = 4096;

/// Errors from the padding codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaddingError {
    /// The payload does not fit the target envelope with its terminator.
    #[error("payload of {len} bytes does not fit in a {target}-byte envelope")]
    EnvelopeTooSmall {
        /// Payload length in bytes.
        len: usize,
        /// Requested envelope size in bytes.
        target: usize,
    },

    /// No `0x80` terminator before the start of the buffer.
    #[error("padded buffer has no terminator")]
    MissingTerminator,
}

/// Pads `data` to exactly `target` bytes.
///
/// # Errors
///
/// Returns [`PaddingError::EnvelopeTooSmall`] unless `target > data.len()`;
/// the terminator byte always needs room.
pub fn pad(data: &[u8], target: usize) -> Result<Vec<u8>, PaddingError> {
    if target <= data.len() {
        return Err(PaddingError::EnvelopeTooSmall {
            len: data.len(),
            target,
        });
    }
    let mut out = Vec::with_capacity(target);
    out.extend_from_slice(data);
    out.push(0x80);
    out.resize(target, 0x00);
    Ok(out)
}

/// Strips the padding applied by [`pad`], returning the original payload.
///
/// # Errors
///
/// Returns [`PaddingError::MissingTerminator`] if the trailing zeros are not
/// preceded by `0x80`.
pub fn unpad(data: &[u8]) -> Result<&[u8], PaddingError> {
    let end = data
        .iter()
        .rposition(|&b| b != 0x00)
        .ok_or(PaddingError::MissingTerminator)?;
    if data[end] != 0x80 {
        return Err(PaddingError::MissingTerminator);
    }
    Ok(&data[..end])
}

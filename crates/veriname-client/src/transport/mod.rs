//! Client↔server transport: framing, secure sessions, dialing.
//!
//! The stack, bottom up:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Padded protocol messages         │  wire::pad / unpad
//! ├─────────────────────────────────────────┤
//! │        Noise NK transport state         │  SecureSession
//! ├─────────────────────────────────────────┤
//! │     Length-prefixed frame codec         │  FrameCodec (4-byte BE)
//! ├─────────────────────────────────────────┤
//! │            TCP via a Dialer             │  TcpDialer or a proxy
//! └─────────────────────────────────────────┘
//! ```
//!
//! After the handshake, each direction is an authenticated, confidential,
//! length-framed stream with a 4 KiB plaintext ceiling. The server is
//! authenticated by its pre-configured 32-byte static key; the client stays
//! anonymous at this layer.

pub mod dialer;
pub mod framing;
pub mod session;

use std::time::Duration;

use thiserror::Error;

pub use dialer::{Dialer, TcpDialer};
pub use framing::FrameCodec;
pub use session::{generate_transport_keypair, SecureSession, MAX_PLAINTEXT_FRAME};

/// Transport-layer failures. All of them are connectivity-class: the
/// orchestrator records them and moves on to the next endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake or AEAD failure.
    #[error("noise transport error: {0}")]
    Noise(#[from] snow::Error),

    /// Outgoing or incoming frame above the protocol ceiling.
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Offending frame size.
        size: usize,
        /// Protocol ceiling.
        max: usize,
    },

    /// Incoming frame too short to even carry an AEAD tag.
    #[error("frame of {size} bytes is shorter than minimum {min}")]
    FrameTooShort {
        /// Offending frame size.
        size: usize,
        /// Minimum valid frame size.
        min: usize,
    },

    /// Peer closed the stream mid-frame or mid-handshake.
    #[error("connection closed before a complete frame")]
    ConnectionClosed,

    /// The per-endpoint deadline elapsed.
    #[error("timed out after {timeout:?} talking to {address}")]
    Timeout {
        /// Endpoint that timed out.
        address: String,
        /// The configured deadline.
        timeout: Duration,
    },

    /// The endpoint list was empty, so there was nothing to try.
    #[error("no endpoints configured")]
    NoEndpoints,
}

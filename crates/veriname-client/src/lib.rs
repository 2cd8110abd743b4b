//! veriname-client - the verified-lookup network client.
//!
//! This crate puts the pure verification pipeline from `veriname-core` on
//! the wire:
//!
//! - [`transport`]: padded, length-framed, mutually-keyed sessions over TCP
//!   (Noise NK against each endpoint's pinned transport key), behind a
//!   swappable [`transport::Dialer`]
//! - [`client`]: the orchestrator that walks the configured endpoint
//!   lists, drives lookup and update flows, and classifies outcomes
//! - [`error`]: the caller-facing error taxonomy
//!
//! One [`client::Client`] value serves any number of concurrent calls; all
//! shared state is immutable after construction and each call owns its
//! connection for exactly the duration of the call.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::ClientError;
pub use transport::{Dialer, SecureSession, TcpDialer, TransportError};

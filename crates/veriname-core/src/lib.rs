//! veriname-core - protocol core for the veriname verified directory.
//!
//! veriname is a name→profile directory with transparency and consensus
//! properties: a client that looks up a name can verify that a quorum of
//! federated servers signed the same global state-root at a recent moment,
//! and that the name resolves (or provably does not resolve) under that
//! root. Bindings evolve only through signed, versioned operations
//! authorised by the current holder's key.
//!
//! This crate contains everything that does not touch a socket:
//!
//! - [`wire`]: protobuf message schema and the padding codec
//! - [`crypto`]: Ed25519 signing contexts and key-file loading
//! - [`operation`]: the profile-operation signing envelope
//! - [`consensus`]: multi-signature state-root verification
//! - [`witness`]: authenticated-path lookup verification
//! - [`profile`]: the expiration-window validity gate
//! - [`config`]: verifier-set and endpoint configuration
//! - [`time`]: injectable clock
//!
//! Every verification function here is pure given an injected [`time::Clock`];
//! the network client lives in `veriname-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod operation;
pub mod profile;
pub mod time;
pub mod wire;
pub mod witness;

pub use config::{ClientConfig, ServerEndpoint, VerifierDescriptor, VerifierSet};
pub use consensus::{ConsensusError, ConsensusVerifier};
pub use profile::{MAX_VALIDITY_PERIOD_SECS, NearExpiry};
pub use time::{Clock, FixedClock, SystemClock};
pub use wire::{ClientMessage, ClientReply, Profile, PublicKey, ReplyStatus, SignedProfileOperation};
pub use witness::{verify_resolve_against_root, WitnessError};

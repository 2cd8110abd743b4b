//! Cryptographic helpers: domain-separated Ed25519 signing and key files.
//!
//! Three fixed signing contexts exist in the protocol, each a byte string
//! with a trailing NUL so that no context is a prefix of another:
//!
//! - `"ModifyProfileOld\0"`: the current holder authorising an operation
//! - `"ModifyProfileNew\0"`: the new holder accepting an operation
//! - `"msg\0"`: a server signing a state-root statement
//!
//! The contexts differ so that an old-owner signature can never be replayed
//! as a new-owner signature (or either as a server statement) and vice
//! versa.

mod keyfile;
mod sign;

pub use keyfile::{read_signing_key, read_transport_key, KeyfileError};
pub use sign::{
    sign_with_context, verify_with_context, NEW_PROFILE_CONTEXT, OLD_PROFILE_CONTEXT,
    PUBLIC_KEY_SIZE, SERVER_MESSAGE_CONTEXT, SIGNATURE_SIZE, SIGNING_KEYPAIR_SIZE,
    TRANSPORT_KEY_SIZE,
};

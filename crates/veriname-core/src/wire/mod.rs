//! Wire schema for the client↔server directory protocol.
//!
//! All structured messages use protobuf tag/length encoding with explicit
//! field presence (`optional` fields carry a presence bit distinct from the
//! zero value) and stable field numbers. Unknown fields are ignored on
//! decode, so clients and servers can evolve independently.
//!
//! The [`padding`] module implements the fixed-envelope padding applied to
//! every request and reply before framing, so that message sizes do not leak
//! which operation is being performed.

pub mod messages;
pub mod padding;

pub use messages::{
    ClientMessage, ClientReply, LookupWitness, Profile, ProfileOperation, PublicKey, ReplyStatus,
    ServerMessage, SignedProfileOperation, SignedServerMessage,
};
pub use padding::{pad, unpad, PaddingError, LOOKUP_REQUEST_SIZE, UPDATE_REQUEST_SIZE};

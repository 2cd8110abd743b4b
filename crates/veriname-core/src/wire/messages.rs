//! Protobuf message types for the directory protocol.
//!
//! The schema is written out by hand rather than generated so that the wire
//! contract is reviewable in one place. Field numbers are frozen; changing
//! one is a protocol break. Decoders must tolerate unknown fields (prost
//! skips them) and must distinguish an absent optional field from its zero
//! value.

use prost::Message;
use sha2::{Digest, Sha256};

/// A public key owned by a server or a profile holder.
///
/// Only Ed25519 keys are recognised today; the message leaves room for
/// additional algorithms without breaking the server-ID derivation, which
/// digests the *encoded* message rather than the raw key bytes.
#[derive(Clone, PartialEq, Message)]
pub struct PublicKey {
    /// Ed25519 verification key (32 bytes) if this key carries one.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub ed25519: Option<Vec<u8>>,
}

impl PublicKey {
    /// Constructs a key from raw Ed25519 verification-key bytes.
    #[must_use]
    pub fn from_ed25519(bytes: [u8; 32]) -> Self {
        Self {
            ed25519: Some(bytes.to_vec()),
        }
    }

    /// Deterministic server ID for this key: the little-endian `u64` read
    /// from the first 8 bytes of SHA-256 over the encoded message.
    #[must_use]
    pub fn id(&self) -> u64 {
        let digest = Sha256::digest(self.encode_to_vec());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(prefix)
    }

    /// Parses the Ed25519 key if present and well-formed.
    #[must_use]
    pub fn ed25519_key(&self) -> Option<ed25519_dalek::VerifyingKey> {
        let bytes = self.ed25519.as_deref()?;
        let bytes: &[u8; 32] = bytes.try_into().ok()?;
        ed25519_dalek::VerifyingKey::from_bytes(bytes).ok()
    }
}

/// A name's profile: the value side of the directory mapping.
///
/// The directory treats profiles as opaque blobs apart from three fields:
/// the signature key that authorises the next operation on the name, the
/// version (strictly monotone across accepted updates), and the expiration
/// time after which servers may drop the binding entirely.
#[derive(Clone, PartialEq, Message)]
pub struct Profile {
    /// Key whose holder may modify or transfer this name.
    #[prost(message, optional, tag = "1")]
    pub signature_key: Option<PublicKey>,
    /// Monotonically increasing version; 0 for a first registration.
    #[prost(uint64, optional, tag = "2")]
    pub version: Option<u64>,
    /// Expiration as seconds since the Unix epoch.
    #[prost(uint64, optional, tag = "3")]
    pub expiration_time: Option<u64>,
}

impl Profile {
    /// Parses the profile's Ed25519 modification key, if any.
    #[must_use]
    pub fn ed25519_key(&self) -> Option<ed25519_dalek::VerifyingKey> {
        self.signature_key.as_ref()?.ed25519_key()
    }
}

/// The inner, signed body of a profile operation: which name, what new
/// profile. Encoded bytes of this message are what both signatures cover.
#[derive(Clone, PartialEq, Message)]
pub struct ProfileOperation {
    /// Name the operation applies to.
    #[prost(bytes = "vec", tag = "1")]
    pub name: Vec<u8>,
    /// Encoded [`Profile`] that the name should map to afterwards.
    #[prost(bytes = "vec", tag = "2")]
    pub new_profile: Vec<u8>,
}

/// Signing envelope around an encoded [`ProfileOperation`].
///
/// `old_profile_signature` is made by the key currently holding the name,
/// `new_profile_signature` by the key taking it over. A self-update carries
/// both signatures from the same key, so servers verify every accepted
/// operation with one uniform two-signature rule.
#[derive(Clone, PartialEq, Message)]
pub struct SignedProfileOperation {
    /// Encoded [`ProfileOperation`] body.
    #[prost(bytes = "vec", tag = "1")]
    pub profile_operation: Vec<u8>,
    /// Current holder's signature, domain-separated (see [`crate::crypto`]).
    #[prost(bytes = "vec", optional, tag = "2")]
    pub old_profile_signature: Option<Vec<u8>>,
    /// New holder's signature, domain-separated (see [`crate::crypto`]).
    #[prost(bytes = "vec", optional, tag = "3")]
    pub new_profile_signature: Option<Vec<u8>>,
}

/// Statement a server makes about its current state-root.
#[derive(Clone, PartialEq, Message)]
pub struct ServerMessage {
    /// ID of the signing server (see [`PublicKey::id`]).
    #[prost(uint64, optional, tag = "1")]
    pub server: Option<u64>,
    /// Statement time as seconds since the Unix epoch.
    #[prost(uint64, optional, tag = "2")]
    pub time: Option<u64>,
    /// Digest of the entire name→profile mapping at `time`.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub hash_of_state: Option<Vec<u8>>,
}

/// An encoded [`ServerMessage`] plus the Ed25519 signature over it.
///
/// The signature covers the domain separator `"msg\0"` followed by the
/// encoded message bytes, not a re-encoding, so verification never depends
/// on encoder determinism.
#[derive(Clone, PartialEq, Message)]
pub struct SignedServerMessage {
    /// Encoded [`ServerMessage`].
    #[prost(bytes = "vec", tag = "1")]
    pub message: Vec<u8>,
    /// Ed25519 signature (64 bytes).
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

impl SignedServerMessage {
    /// Decodes the inner [`ServerMessage`].
    ///
    /// # Errors
    ///
    /// Returns the prost decode error if the bytes are malformed.
    pub fn decode_message(&self) -> Result<ServerMessage, prost::DecodeError> {
        ServerMessage::decode(self.message.as_slice())
    }
}

/// Authenticated path for one name under one state-root.
///
/// The witness proves presence (the `profile` field is set and the leaf
/// commits to its digest) or absence (the `profile` field is unset and the
/// leaf is an empty-value leaf). See [`crate::witness`] for the hash
/// construction.
#[derive(Clone, PartialEq, Message)]
pub struct LookupWitness {
    /// Encoded profile bytes when the name is present; unset for absence.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub profile: Option<Vec<u8>>,
    /// Sibling hashes from the leaf up to the root, 32 bytes each.
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub siblings: Vec<Vec<u8>>,
}

/// A request from a client to a server.
///
/// Exactly one of the two flows is used per request: a lookup sets
/// `peek_state`, `resolve_name` and `pad_reply_to`; an update sets
/// `modify_profile` and optionally `invite_code`.
#[derive(Clone, PartialEq, Message)]
pub struct ClientMessage {
    /// Profile operation to enact (update flow).
    #[prost(message, optional, tag = "1")]
    pub modify_profile: Option<SignedProfileOperation>,
    /// Ask the server for its signed state confirmations (lookup flow).
    #[prost(bool, optional, tag = "2")]
    pub peek_state: Option<bool>,
    /// Name to resolve under the confirmed root (lookup flow).
    #[prost(bytes = "vec", optional, tag = "3")]
    pub resolve_name: Option<Vec<u8>>,
    /// Envelope size the server should pad its reply to.
    #[prost(uint64, optional, tag = "4")]
    pub pad_reply_to: Option<u64>,
    /// Invite token accompanying a first registration.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub invite_code: Option<Vec<u8>>,
}

/// Status codes a server may return for an update request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ReplyStatus {
    /// The operation was accepted.
    Ok = 0,
    /// The server is not accepting new registrations.
    RegistrationDisabled = 1,
    /// The invite token did not verify.
    InviteInvalid = 2,
    /// The invite token was already consumed.
    InviteUsed = 3,
    /// The operation's signatures did not authorise the change.
    NotAuthorized = 4,
}

/// A server's response to a [`ClientMessage`].
#[derive(Clone, PartialEq, Message)]
pub struct ClientReply {
    /// Update outcome; absent means [`ReplyStatus::Ok`].
    #[prost(enumeration = "ReplyStatus", optional, tag = "1")]
    pub status: Option<i32>,
    /// Signed state-root statements backing a lookup reply.
    #[prost(message, repeated, tag = "2")]
    pub state_confirmations: Vec<SignedServerMessage>,
    /// Authenticated path for the requested name.
    #[prost(message, optional, tag = "3")]
    pub lookup_nodes: Option<LookupWitness>,
}

impl ClientReply {
    /// The raw status code, defaulting to OK when the field is absent.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        self.status.unwrap_or(ReplyStatus::Ok as i32)
    }
}

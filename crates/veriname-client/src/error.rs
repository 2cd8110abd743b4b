//! Caller-facing error taxonomy.
//!
//! Callers need to branch on outcomes without string matching, so every
//! outcome class is a distinct variant. Two deserve emphasis:
//!
//! - [`ClientError::OutOfDate`] is a *success with a warning*: the profile
//!   inside it verified under a consensus root; it is merely close to
//!   expiry. Use [`ClientError::out_of_date_profile`] to keep the data.
//! - [`ClientError::Connectivity`] means no server answered
//!   authoritatively; it wraps the last transport-level failure. Every
//!   other variant means a server *did* answer and retrying another
//!   endpoint would be wrong.

use veriname_core::consensus::ConsensusError;
use veriname_core::profile::NearExpiry;
use veriname_core::wire::{PaddingError, Profile};
use veriname_core::witness::WitnessError;

use crate::transport::TransportError;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server is not accepting new registrations.
    #[error("registration disabled")]
    RegistrationDisabled,

    /// The invite token did not verify.
    #[error("invite not valid")]
    InviteInvalid,

    /// The invite token was already consumed.
    #[error("invite already used")]
    InviteUsed,

    /// The operation's signatures did not authorise the change.
    #[error("not authorized")]
    NotAuthorized,

    /// The server answered with a status outside the enumerated set.
    /// Defensive; never retried on another endpoint.
    #[error("unknown status code {code}")]
    UnknownStatus {
        /// The raw status value.
        code: i32,
    },

    /// The confirmation set did not establish a usable root.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// The witness did not prove presence or absence under the root.
    #[error("could not verify the correctness of the response: {0}")]
    CouldNotVerify(#[from] WitnessError),

    /// The verified profile is near expiry. The profile is carried here so
    /// the caller can still use it.
    #[error("{cause}")]
    OutOfDate {
        /// The verified, near-expiry profile.
        profile: Box<Profile>,
        /// Why the gate flagged it, naming the expiry instant.
        cause: NearExpiry,
    },

    /// A reply or profile failed to decode.
    #[error("malformed reply: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A reply's padding was malformed.
    #[error("malformed reply padding: {0}")]
    Padding(#[from] PaddingError),

    /// A request could not be assembled (payload over the envelope size).
    #[error("request does not fit its envelope: {0}")]
    RequestTooLarge(PaddingError),

    /// No server answered; holds the last transport-level failure.
    #[error("no server reachable: {last}")]
    Connectivity {
        /// The last underlying transport error.
        #[source]
        last: TransportError,
    },
}

impl ClientError {
    /// Whether this is the near-expiry warning.
    #[must_use]
    pub fn is_out_of_date(&self) -> bool {
        matches!(self, Self::OutOfDate { .. })
    }

    /// The verified profile carried by an [`ClientError::OutOfDate`].
    #[must_use]
    pub fn out_of_date_profile(&self) -> Option<&Profile> {
        match self {
            Self::OutOfDate { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(last: TransportError) -> Self {
        Self::Connectivity { last }
    }
}

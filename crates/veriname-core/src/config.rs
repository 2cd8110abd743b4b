//! Client configuration: the verifier set, endpoint lists and thresholds.
//!
//! Configuration objects are constructed once per client and are immutable
//! thereafter; nothing here is re-read or hot-swapped mid-call. The
//! serde-facing [`ClientConfigFile`] mirrors [`ClientConfig`] with base64
//! keys and plain-seconds durations so it can live in a JSON file; the
//! [`ServerConfig`] types at the bottom document the configuration surface
//! of the server collaborator and are not interpreted by the client.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::TRANSPORT_KEY_SIZE;
use crate::wire::PublicKey;

/// One consensus server the client trusts: a display name and its signing
/// key. Identity is the key's digest ([`PublicKey::id`]); the name exists
/// only for diagnostics.
#[derive(Debug, Clone)]
pub struct VerifierDescriptor {
    /// Human-readable server name, used in error messages.
    pub name: String,
    /// The server's signing key.
    pub public_key: PublicKey,
}

impl VerifierDescriptor {
    /// The server ID this descriptor is keyed by.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.public_key.id()
    }
}

/// The closed universe of signers that count toward consensus.
#[derive(Debug, Clone, Default)]
pub struct VerifierSet {
    by_id: BTreeMap<u64, VerifierDescriptor>,
}

impl VerifierSet {
    /// Builds a set from descriptors, keyed by public-key digest.
    /// Descriptors with colliding IDs collapse to the last one given.
    #[must_use]
    pub fn new(descriptors: impl IntoIterator<Item = VerifierDescriptor>) -> Self {
        Self {
            by_id: descriptors.into_iter().map(|d| (d.id(), d)).collect(),
        }
    }

    /// Looks up a descriptor by server ID.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&VerifierDescriptor> {
        self.by_id.get(&id)
    }

    /// Number of configured verifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterates descriptors in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &VerifierDescriptor> {
        self.by_id.values()
    }
}

/// One server address a client may talk to.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    /// `host:port` to dial.
    pub address: String,
    /// Deadline for the whole exchange against this endpoint.
    pub timeout: Duration,
    /// The endpoint's static transport key, pinned at configuration time.
    pub transport_public_key: [u8; TRANSPORT_KEY_SIZE],
}

/// Everything a client needs to run verified lookups and updates.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Signers that count toward consensus.
    pub verifiers: VerifierSet,
    /// Endpoints tried, in order, for lookups.
    pub lookup_servers: Vec<ServerEndpoint>,
    /// Endpoints tried, in order, for updates.
    pub update_servers: Vec<ServerEndpoint>,
    /// Distinct verified signers required to accept a state-root.
    pub consensus_signatures_required: u32,
    /// Distinct fresh signers required on top of consensus.
    pub freshness_signatures_required: u32,
    /// Maximum age of a state-root statement.
    pub freshness_threshold: Duration,
}

/// Errors turning a [`ClientConfigFile`] into a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A base64 field failed to decode.
    #[error("invalid base64 in {field} for {name}")]
    InvalidBase64 {
        /// Field that failed.
        field: &'static str,
        /// Entry the field belongs to.
        name: String,
    },

    /// An encoded key field did not parse.
    #[error("invalid {field} for {name}")]
    InvalidKey {
        /// Field that failed.
        field: &'static str,
        /// Entry the field belongs to.
        name: String,
    },

    /// A key field had the wrong length.
    #[error("{field} for {name}: expected {expected} bytes, got {got}")]
    WrongKeyLength {
        /// Field that failed.
        field: &'static str,
        /// Entry the field belongs to.
        name: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// The verifier list was empty.
    #[error("no verifiers configured")]
    NoVerifiers,

    /// An endpoint list was empty.
    #[error("no {which} servers configured")]
    NoServers {
        /// Which list was empty.
        which: &'static str,
    },

    /// A signature-count threshold was zero.
    #[error("{field} must be positive")]
    ZeroThreshold {
        /// The zero field.
        field: &'static str,
    },
}

/// Serde mirror of one verifier entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierEntry {
    /// Display name.
    pub name: String,
    /// Base64 of the encoded [`PublicKey`] message.
    pub public_key: String,
}

/// Serde mirror of one endpoint entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointEntry {
    /// `host:port` to dial.
    pub address: String,
    /// Per-exchange deadline in seconds.
    pub timeout_secs: u64,
    /// Base64 of the endpoint's 32-byte transport key.
    pub transport_public_key: String,
}

/// On-disk client configuration (JSON via serde).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigFile {
    /// Trusted signers.
    pub verifiers: Vec<VerifierEntry>,
    /// Lookup endpoints in preference order.
    pub lookup_servers: Vec<EndpointEntry>,
    /// Update endpoints in preference order.
    pub update_servers: Vec<EndpointEntry>,
    /// Distinct verified signers required for consensus.
    pub consensus_signatures_required: u32,
    /// Distinct fresh signers required.
    pub freshness_signatures_required: u32,
    /// Maximum statement age in seconds.
    pub freshness_threshold_secs: u64,
}

impl ClientConfigFile {
    /// Validates and converts into a runnable [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Fails on undecodable keys, empty verifier or endpoint lists, or
    /// zero thresholds.
    pub fn parse(&self) -> Result<ClientConfig, ConfigError> {
        if self.verifiers.is_empty() {
            return Err(ConfigError::NoVerifiers);
        }
        if self.consensus_signatures_required == 0 {
            return Err(ConfigError::ZeroThreshold {
                field: "consensus_signatures_required",
            });
        }
        if self.freshness_signatures_required == 0 {
            return Err(ConfigError::ZeroThreshold {
                field: "freshness_signatures_required",
            });
        }

        let mut descriptors = Vec::with_capacity(self.verifiers.len());
        for entry in &self.verifiers {
            let bytes =
                BASE64
                    .decode(&entry.public_key)
                    .map_err(|_| ConfigError::InvalidBase64 {
                        field: "public_key",
                        name: entry.name.clone(),
                    })?;
            let public_key =
                PublicKey::decode(bytes.as_slice()).map_err(|_| ConfigError::InvalidKey {
                    field: "public_key",
                    name: entry.name.clone(),
                })?;
            descriptors.push(VerifierDescriptor {
                name: entry.name.clone(),
                public_key,
            });
        }

        let lookup_servers = parse_endpoints(&self.lookup_servers, "lookup")?;
        let update_servers = parse_endpoints(&self.update_servers, "update")?;

        Ok(ClientConfig {
            verifiers: VerifierSet::new(descriptors),
            lookup_servers,
            update_servers,
            consensus_signatures_required: self.consensus_signatures_required,
            freshness_signatures_required: self.freshness_signatures_required,
            freshness_threshold: Duration::from_secs(self.freshness_threshold_secs),
        })
    }
}

fn parse_endpoints(
    entries: &[EndpointEntry],
    which: &'static str,
) -> Result<Vec<ServerEndpoint>, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::NoServers { which });
    }
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let bytes = BASE64
            .decode(&entry.transport_public_key)
            .map_err(|_| ConfigError::InvalidBase64 {
                field: "transport_public_key",
                name: entry.address.clone(),
            })?;
        let transport_public_key: [u8; TRANSPORT_KEY_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ConfigError::WrongKeyLength {
                    field: "transport_public_key",
                    name: entry.address.clone(),
                    expected: TRANSPORT_KEY_SIZE,
                    got: bytes.len(),
                })?;
        out.push(ServerEndpoint {
            address: entry.address.clone(),
            timeout: Duration::from_secs(entry.timeout_secs),
            transport_public_key,
        });
    }
    Ok(out)
}

/// Backend section of the server collaborator's configuration.
///
/// The client never reads these types; they pin down the contract the
/// external server implementation is configured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Directory holding the replicated log and state machine.
    pub data_directory: String,
    /// Path to the 64-byte Ed25519 signing keypair. Must be a regular file
    /// with no group/other permission bits.
    pub signing_key_path: String,
    /// Peer listen address, if this server participates in consensus.
    pub listen: Option<String>,
    /// Number of peers that must agree before a state-root is signed.
    pub consensus_threshold: u32,
}

/// Frontend section of the server collaborator's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Client listen address.
    pub listen: Option<String>,
    /// Path to the 32-byte transport key. Same permission rule as the
    /// signing key.
    pub transport_key_path: String,
    /// Path to the invite MAC key, if registrations are gated on invites.
    pub invite_key_path: Option<String>,
}

/// One peer entry in the server collaborator's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Base64 of the peer's encoded [`PublicKey`] message.
    pub public_key: String,
    /// Whether the peer takes part in consensus rounds (as opposed to
    /// subscribing to the outcome).
    pub is_core: bool,
}

/// The server collaborator's configuration surface, documented here as a
/// contract only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend (consensus) settings.
    pub backend: BackendConfig,
    /// Frontend (client-facing) settings.
    pub frontend: FrontendConfig,
    /// Peer table keyed by backend address.
    pub servers: BTreeMap<String, PeerEntry>,
}

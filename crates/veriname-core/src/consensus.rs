//! Multi-signature consensus verification over state-roots.
//!
//! A lookup reply carries a list of signed state-root statements. The
//! verifier accepts a root only when enough *distinct, configured* servers
//! have validly signed the same root, and enough of those signatures are
//! recent. Three failure modes are distinguished because they demand
//! different operator reactions:
//!
//! - [`ConsensusError::ConsensusSplit`]: two verified servers signed
//!   different roots. The reply is repudiated outright, whatever the
//!   counts; conflicting valid statements are the fork signal this whole
//!   mechanism exists to catch.
//! - [`ConsensusError::InsufficientConsensus`]: fewer distinct verified
//!   signers than required. The error names the servers that did count so
//!   a misconfigured verifier set is diagnosable.
//! - [`ConsensusError::Stale`]: consensus held, but not enough of it is
//!   recent.
//!
//! Anything unverifiable (undecodable statements, unknown signer IDs,
//! descriptors without an Ed25519 key, bad signatures) is skipped, never
//! fatal: one garbage entry must not poison an otherwise sufficient reply.
//! Duplicate statements by one server count once (the sets are keyed by
//! server ID, not list position).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::VerifierSet;
use crate::crypto::{verify_with_context, SERVER_MESSAGE_CONTEXT};
use crate::time::Clock;
use crate::wire::SignedServerMessage;

/// Consensus verification failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Verified servers signed different state-roots.
    #[error("verified servers signed conflicting state roots")]
    ConsensusSplit,

    /// Not enough distinct verified signers.
    #[error(
        "not enough valid signatures for consensus ({got} out of {need}): {}",
        contributors.join(", ")
    )]
    InsufficientConsensus {
        /// Distinct verified signers seen.
        got: usize,
        /// Signers required.
        need: usize,
        /// Names of the servers that did contribute.
        contributors: Vec<String>,
    },

    /// Consensus held but not enough signatures are recent.
    #[error(
        "not enough fresh signatures ({got} out of {need}): {}",
        contributors.join(", ")
    )]
    Stale {
        /// Distinct fresh signers seen.
        got: usize,
        /// Fresh signers required.
        need: usize,
        /// Names of the servers whose statements were fresh.
        contributors: Vec<String>,
    },
}

/// Checks confirmation sets against a configured verifier set and
/// thresholds. Immutable after construction; one instance serves any
/// number of concurrent calls.
#[derive(Clone)]
pub struct ConsensusVerifier {
    verifiers: VerifierSet,
    consensus_signatures_required: usize,
    freshness_signatures_required: usize,
    freshness_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ConsensusVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusVerifier")
            .field("verifiers", &self.verifiers.len())
            .field("consensus_required", &self.consensus_signatures_required)
            .field("freshness_required", &self.freshness_signatures_required)
            .field("freshness_threshold", &self.freshness_threshold)
            .finish_non_exhaustive()
    }
}

impl ConsensusVerifier {
    /// Builds a verifier. Both signature requirements are clamped to at
    /// least one: a directory where zero signatures suffice is not a
    /// directory anyone should trust.
    #[must_use]
    pub fn new(
        verifiers: VerifierSet,
        consensus_signatures_required: u32,
        freshness_signatures_required: u32,
        freshness_threshold: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifiers,
            consensus_signatures_required: consensus_signatures_required.max(1) as usize,
            freshness_signatures_required: freshness_signatures_required.max(1) as usize,
            freshness_threshold,
            clock,
        }
    }

    /// Verifies a confirmation set and returns the agreed state-root.
    ///
    /// Deterministic in its inputs and the injected clock: running it twice
    /// over the same list yields the same outcome.
    ///
    /// # Errors
    ///
    /// See [`ConsensusError`] for the three failure modes.
    pub fn verify(
        &self,
        confirmations: &[SignedServerMessage],
    ) -> Result<Vec<u8>, ConsensusError> {
        let now = self.clock.now_secs();
        let threshold = self.freshness_threshold.as_secs();

        let mut root: Option<Vec<u8>> = None;
        let mut consensus_servers = BTreeSet::new();
        let mut fresh_servers = BTreeSet::new();

        for signed in confirmations {
            let Ok(message) = signed.decode_message() else {
                continue;
            };
            let Some(server) = message.server else {
                continue;
            };
            let Some(descriptor) = self.verifiers.get(server) else {
                continue;
            };
            let Some(key) = descriptor.public_key.ed25519_key() else {
                continue;
            };
            if !verify_with_context(
                &key,
                SERVER_MESSAGE_CONTEXT,
                &signed.message,
                &signed.signature,
            ) {
                continue;
            }

            let hash = message.hash_of_state.unwrap_or_default();
            match &root {
                None => root = Some(hash),
                Some(agreed) if *agreed != hash => return Err(ConsensusError::ConsensusSplit),
                Some(_) => {}
            }

            consensus_servers.insert(server);
            if message.time.unwrap_or(0).saturating_add(threshold) > now {
                fresh_servers.insert(server);
            }
        }

        if consensus_servers.len() < self.consensus_signatures_required {
            return Err(ConsensusError::InsufficientConsensus {
                got: consensus_servers.len(),
                need: self.consensus_signatures_required,
                contributors: self.names(&consensus_servers),
            });
        }
        if fresh_servers.len() < self.freshness_signatures_required {
            return Err(ConsensusError::Stale {
                got: fresh_servers.len(),
                need: self.freshness_signatures_required,
                contributors: self.names(&fresh_servers),
            });
        }

        // The consensus threshold is at least one, so a root was adopted.
        root.ok_or(ConsensusError::InsufficientConsensus {
            got: 0,
            need: self.consensus_signatures_required,
            contributors: Vec::new(),
        })
    }

    fn names(&self, ids: &BTreeSet<u64>) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.verifiers.get(*id))
            .map(|descriptor| descriptor.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use prost::Message as _;
    use rand::rngs::OsRng;

    use super::*;
    use crate::config::VerifierDescriptor;
    use crate::crypto::sign_with_context;
    use crate::time::FixedClock;
    use crate::wire::{PublicKey, ServerMessage};

    const NOW: u64 = 1_700_000_000;

    struct TestServer {
        name: &'static str,
        key: SigningKey,
    }

    impl TestServer {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                key: SigningKey::generate(&mut OsRng),
            }
        }

        fn descriptor(&self) -> VerifierDescriptor {
            VerifierDescriptor {
                name: self.name.into(),
                public_key: PublicKey::from_ed25519(self.key.verifying_key().to_bytes()),
            }
        }

        fn id(&self) -> u64 {
            self.descriptor().id()
        }

        fn confirm(&self, root: &[u8], time: u64) -> SignedServerMessage {
            let message = ServerMessage {
                server: Some(self.id()),
                time: Some(time),
                hash_of_state: Some(root.to_vec()),
            }
            .encode_to_vec();
            let signature = sign_with_context(&self.key, SERVER_MESSAGE_CONTEXT, &message);
            SignedServerMessage { message, signature }
        }
    }

    fn verifier_for(servers: &[&TestServer], consensus: u32, fresh: u32) -> ConsensusVerifier {
        ConsensusVerifier::new(
            VerifierSet::new(servers.iter().map(|s| s.descriptor())),
            consensus,
            fresh,
            Duration::from_secs(60),
            Arc::new(FixedClock::new(NOW)),
        )
    }

    #[test]
    fn accepts_fresh_quorum() {
        let (a, b, c) = (
            TestServer::new("a"),
            TestServer::new("b"),
            TestServer::new("c"),
        );
        let verifier = verifier_for(&[&a, &b, &c], 2, 2);
        let root = [0xAA; 32];
        let confirmations = vec![
            a.confirm(&root, NOW - 10),
            b.confirm(&root, NOW - 10),
            c.confirm(&root, NOW - 10),
        ];
        assert_eq!(verifier.verify(&confirmations).unwrap(), root.to_vec());
    }

    #[test]
    fn conflicting_verified_roots_split() {
        let (a, b, c) = (
            TestServer::new("a"),
            TestServer::new("b"),
            TestServer::new("c"),
        );
        let verifier = verifier_for(&[&a, &b, &c], 2, 2);
        let confirmations = vec![
            a.confirm(&[0x11; 32], NOW - 10),
            b.confirm(&[0x11; 32], NOW - 10),
            c.confirm(&[0x22; 32], NOW - 10),
        ];
        assert_eq!(
            verifier.verify(&confirmations),
            Err(ConsensusError::ConsensusSplit)
        );
    }

    #[test]
    fn split_detected_even_below_threshold() {
        let (a, b) = (TestServer::new("a"), TestServer::new("b"));
        let verifier = verifier_for(&[&a, &b], 5, 5);
        let confirmations = vec![a.confirm(&[0x11; 32], NOW), b.confirm(&[0x22; 32], NOW)];
        assert_eq!(
            verifier.verify(&confirmations),
            Err(ConsensusError::ConsensusSplit)
        );
    }

    #[test]
    fn stale_statements_fail_freshness_only() {
        let (a, b, c) = (
            TestServer::new("a"),
            TestServer::new("b"),
            TestServer::new("c"),
        );
        let verifier = verifier_for(&[&a, &b, &c], 2, 2);
        let root = [0xAA; 32];
        // Two of three are far older than the 60s freshness threshold.
        let confirmations = vec![
            a.confirm(&root, NOW - 600),
            b.confirm(&root, NOW - 600),
            c.confirm(&root, NOW - 10),
        ];
        match verifier.verify(&confirmations) {
            Err(ConsensusError::Stale {
                got,
                need,
                contributors,
            }) => {
                assert_eq!((got, need), (1, 2));
                assert_eq!(contributors, vec!["c".to_string()]);
            }
            other => panic!("expected Stale, got {other:?}"),
        }
    }

    #[test]
    fn duplicates_count_once() {
        let (a, b) = (TestServer::new("a"), TestServer::new("b"));
        let verifier = verifier_for(&[&a, &b], 2, 1);
        let root = [0xAA; 32];
        let confirmation = a.confirm(&root, NOW - 1);
        let confirmations = vec![confirmation.clone(), confirmation.clone(), confirmation];
        match verifier.verify(&confirmations) {
            Err(ConsensusError::InsufficientConsensus {
                got,
                need,
                contributors,
            }) => {
                assert_eq!((got, need), (1, 2));
                assert_eq!(contributors, vec!["a".to_string()]);
            }
            other => panic!("expected InsufficientConsensus, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_invalid_entries_are_skipped_not_fatal() {
        let (a, b) = (TestServer::new("a"), TestServer::new("b"));
        let stranger = TestServer::new("stranger");
        let verifier = verifier_for(&[&a, &b], 2, 2);
        let root = [0xAA; 32];

        let mut forged = a.confirm(&root, NOW - 1);
        forged.signature[0] ^= 0xFF;

        let confirmations = vec![
            SignedServerMessage {
                message: b"garbage that is not a ServerMessage".to_vec(),
                signature: vec![0; 64],
            },
            stranger.confirm(&root, NOW - 1), // not in the verifier set
            forged,                           // bad signature
            a.confirm(&root, NOW - 1),
            b.confirm(&root, NOW - 1),
        ];
        assert_eq!(verifier.verify(&confirmations).unwrap(), root.to_vec());
    }

    #[test]
    fn unknown_signer_contributes_to_neither_set() {
        let a = TestServer::new("a");
        let stranger = TestServer::new("stranger");
        let verifier = verifier_for(&[&a], 1, 1);
        // Only the stranger speaks: no verified signers at all.
        let confirmations = vec![stranger.confirm(&[0xAA; 32], NOW)];
        assert!(matches!(
            verifier.verify(&confirmations),
            Err(ConsensusError::InsufficientConsensus { got: 0, .. })
        ));
    }

    #[test]
    fn verification_is_idempotent() {
        let (a, b) = (TestServer::new("a"), TestServer::new("b"));
        let verifier = verifier_for(&[&a, &b], 2, 2);
        let root = [0xAA; 32];
        let confirmations = vec![a.confirm(&root, NOW - 5), b.confirm(&root, NOW - 5)];
        let first = verifier.verify(&confirmations);
        let second = verifier.verify(&confirmations);
        assert_eq!(first, second);
    }

    #[test]
    fn descriptor_without_ed25519_key_is_skipped() {
        let a = TestServer::new("a");
        let mut descriptor = a.descriptor();
        descriptor.public_key = PublicKey::default();
        // Reconstruct the verifier around the keyless descriptor. Its ID
        // changes with the key, so sign under the stripped descriptor's ID.
        let keyless_id = descriptor.id();
        let verifier = ConsensusVerifier::new(
            VerifierSet::new([descriptor]),
            1,
            1,
            Duration::from_secs(60),
            Arc::new(FixedClock::new(NOW)),
        );
        let message = ServerMessage {
            server: Some(keyless_id),
            time: Some(NOW),
            hash_of_state: Some(vec![0xAA; 32]),
        }
        .encode_to_vec();
        let signature = sign_with_context(&a.key, SERVER_MESSAGE_CONTEXT, &message);
        let confirmations = vec![SignedServerMessage { message, signature }];
        assert!(matches!(
            verifier.verify(&confirmations),
            Err(ConsensusError::InsufficientConsensus { got: 0, .. })
        ));
    }

    #[test]
    fn freshness_boundary_is_strict() {
        let a = TestServer::new("a");
        let verifier = verifier_for(&[&a], 1, 1);
        let root = [0xAA; 32];
        // time + threshold == now is not fresh; one second later is.
        assert!(matches!(
            verifier.verify(&[a.confirm(&root, NOW - 60)]),
            Err(ConsensusError::Stale { .. })
        ));
        assert!(verifier.verify(&[a.confirm(&root, NOW - 59)]).is_ok());
    }
}

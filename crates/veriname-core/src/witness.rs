//! Authenticated-path verification of lookups.
//!
//! The directory commits to the whole name→profile mapping with a sparse
//! Merkle tree over a 256-bit keyspace; the state-root that consensus
//! agrees on is the root of that tree. A lookup reply carries a witness: a
//! compressed path of sibling hashes from the name's leaf up to the root.
//!
//! Presence and absence are both provable and structurally distinct:
//!
//! - presence: the witness carries the profile bytes and the leaf commits
//!   to their digest;
//! - absence: the witness carries no profile and the leaf is the
//!   empty-value leaf for the name's key.
//!
//! A witness that proves neither (missing, oversized, malformed, or not
//! folding to the expected root) is an error, never a `None` result.
//!
//! Every hash is domain-separated so leaves can never be confused with
//! interior nodes or with the key derivation.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::wire::LookupWitness;

/// Hash width of the tree.
pub const HASH_SIZE: usize = 32;

/// Upper bound on witness depth: one sibling per key bit.
pub const MAX_WITNESS_DEPTH: usize = HASH_SIZE * 8;

const KEY_CONTEXT: &[u8] = b"lookup_key\x00";
const LEAF_CONTEXT: &[u8] = b"lookup_leaf\x00";
const NODE_CONTEXT: &[u8] = b"lookup_node\x00";
const VALUE_CONTEXT: &[u8] = b"lookup_value\x00";
const EMPTY_VALUE_CONTEXT: &[u8] = b"lookup_value_empty\x00";

/// Witness verification failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WitnessError {
    /// The reply carried no witness at all.
    #[error("reply carried no lookup witness")]
    Missing,

    /// The root the caller verified has the wrong width.
    #[error("state root is {got} bytes, expected {expected}")]
    BadRoot {
        /// Actual root length.
        got: usize,
        /// Required root length.
        expected: usize,
    },

    /// More siblings than the keyspace has bits.
    #[error("witness depth {depth} exceeds maximum {max}")]
    TooDeep {
        /// Sibling count in the witness.
        depth: usize,
        /// Maximum permitted depth.
        max: usize,
    },

    /// A sibling hash has the wrong width.
    #[error("sibling {index} is {got} bytes, expected {expected}")]
    BadSibling {
        /// Position of the malformed sibling.
        index: usize,
        /// Actual length.
        got: usize,
        /// Required length.
        expected: usize,
    },

    /// The witness does not fold to the verified root.
    #[error("witness does not match the verified state root")]
    RootMismatch,
}

/// Derives the fixed 256-bit tree key for a name.
#[must_use]
pub fn lookup_key(name: &[u8]) -> [u8; HASH_SIZE] {
    hash2(KEY_CONTEXT, name, &[])
}

/// Computes the root a witness commits to for `name`.
///
/// This is the server/prover side of [`verify_resolve_against_root`] and is
/// also what integration tests use to fabricate consistent replies.
///
/// # Errors
///
/// Fails on structural defects (depth, sibling width); it cannot fail on
/// content, since any well-formed witness commits to exactly one root.
pub fn witness_root(name: &[u8], witness: &LookupWitness) -> Result<[u8; HASH_SIZE], WitnessError> {
    if witness.siblings.len() > MAX_WITNESS_DEPTH {
        return Err(WitnessError::TooDeep {
            depth: witness.siblings.len(),
            max: MAX_WITNESS_DEPTH,
        });
    }

    let key = lookup_key(name);
    let value_hash = match witness.profile.as_deref() {
        Some(profile) => hash2(VALUE_CONTEXT, profile, &[]),
        None => hash2(EMPTY_VALUE_CONTEXT, &[], &[]),
    };
    let mut current = hash2(LEAF_CONTEXT, &key, &value_hash);

    let depth = witness.siblings.len();
    for (i, sibling) in witness.siblings.iter().enumerate() {
        let sibling: &[u8; HASH_SIZE] =
            sibling
                .as_slice()
                .try_into()
                .map_err(|_| WitnessError::BadSibling {
                    index: i,
                    got: sibling.len(),
                    expected: HASH_SIZE,
                })?;
        // Siblings are ordered leaf to root; the direction at each level is
        // the key bit for that depth, most significant bit first.
        current = if key_bit(&key, depth - 1 - i) == 0 {
            hash2(NODE_CONTEXT, &current, sibling)
        } else {
            hash2(NODE_CONTEXT, sibling, &current)
        };
    }
    Ok(current)
}

/// Proves that `name` resolves (or provably does not resolve) under a
/// verified state-root.
///
/// Returns the profile bytes for presence, `None` for a proven absence.
///
/// # Errors
///
/// Any witness that does not prove one or the other is a [`WitnessError`].
pub fn verify_resolve_against_root(
    root: &[u8],
    name: &[u8],
    witness: Option<&LookupWitness>,
) -> Result<Option<Vec<u8>>, WitnessError> {
    let root: &[u8; HASH_SIZE] = root.try_into().map_err(|_| WitnessError::BadRoot {
        got: root.len(),
        expected: HASH_SIZE,
    })?;
    let witness = witness.ok_or(WitnessError::Missing)?;
    if witness_root(name, witness)? != *root {
        return Err(WitnessError::RootMismatch);
    }
    Ok(witness.profile.clone())
}

fn key_bit(key: &[u8; HASH_SIZE], depth: usize) -> u8 {
    (key[depth / 8] >> (7 - depth % 8)) & 1
}

fn hash2(context: &[u8], a: &[u8], b: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(context);
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

//! The profile-operation signing envelope.
//!
//! Every change to a name travels as a [`SignedProfileOperation`]: an
//! encoded `{name, new_profile}` body plus up to two domain-separated
//! Ed25519 signatures. Which signatures are present encodes the flow:
//!
//! | Flow              | Signatures                        |
//! |-------------------|-----------------------------------|
//! | Register          | new only (plus an invite)         |
//! | Modify            | old and new, same key             |
//! | Transfer proposal | old only, by the current holder   |
//! | Accept transfer   | old kept + new, by the recipient  |
//!
//! Modify deliberately double-signs with one key: servers then verify every
//! accepted operation with the same both-signatures rule instead of
//! special-casing self-updates.
//!
//! Signatures cover the encoded body bytes as they sit in the envelope, so
//! re-encoding can never invalidate them.

use ed25519_dalek::{SigningKey, VerifyingKey};
use prost::Message;

use crate::crypto::{
    sign_with_context, verify_with_context, NEW_PROFILE_CONTEXT, OLD_PROFILE_CONTEXT,
};
use crate::wire::{Profile, ProfileOperation, SignedProfileOperation};

/// Builds an unsigned operation binding `name` to `profile`.
#[must_use]
pub fn make_operation(name: &[u8], profile: &Profile) -> SignedProfileOperation {
    let body = ProfileOperation {
        name: name.to_vec(),
        new_profile: profile.encode_to_vec(),
    };
    SignedProfileOperation {
        profile_operation: body.encode_to_vec(),
        old_profile_signature: None,
        new_profile_signature: None,
    }
}

/// Adds the current holder's signature to `op`.
#[must_use]
pub fn old_sign(key: &SigningKey, mut op: SignedProfileOperation) -> SignedProfileOperation {
    op.old_profile_signature = Some(sign_with_context(
        key,
        OLD_PROFILE_CONTEXT,
        &op.profile_operation,
    ));
    op
}

/// Adds the new holder's signature to `op`.
#[must_use]
pub fn new_sign(key: &SigningKey, mut op: SignedProfileOperation) -> SignedProfileOperation {
    op.new_profile_signature = Some(sign_with_context(
        key,
        NEW_PROFILE_CONTEXT,
        &op.profile_operation,
    ));
    op
}

/// Builds a transfer proposal: an offer, signed by the current holder, to
/// hand `name` over to whoever holds the key in `profile`. The recipient
/// completes it with [`new_sign`] (see `Client::accept_transfer`).
#[must_use]
pub fn transfer_proposal(
    current_key: &SigningKey,
    name: &[u8],
    profile: &Profile,
) -> SignedProfileOperation {
    old_sign(current_key, make_operation(name, profile))
}

/// Decodes the operation body out of an envelope.
///
/// # Errors
///
/// Returns the prost decode error for malformed body bytes.
pub fn decode_operation(
    op: &SignedProfileOperation,
) -> Result<ProfileOperation, prost::DecodeError> {
    ProfileOperation::decode(op.profile_operation.as_slice())
}

/// Checks the current holder's signature, if present, under `key`.
#[must_use]
pub fn verify_old_signature(key: &VerifyingKey, op: &SignedProfileOperation) -> bool {
    op.old_profile_signature.as_deref().is_some_and(|signature| {
        verify_with_context(key, OLD_PROFILE_CONTEXT, &op.profile_operation, signature)
    })
}

/// Checks the new holder's signature, if present, under `key`.
#[must_use]
pub fn verify_new_signature(key: &VerifyingKey, op: &SignedProfileOperation) -> bool {
    op.new_profile_signature.as_deref().is_some_and(|signature| {
        verify_with_context(key, NEW_PROFILE_CONTEXT, &op.profile_operation, signature)
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;
    use crate::wire::PublicKey;

    fn profile_for(key: &SigningKey, version: u64) -> Profile {
        Profile {
            signature_key: Some(PublicKey::from_ed25519(key.verifying_key().to_bytes())),
            version: Some(version),
            expiration_time: Some(2_000_000_000),
        }
    }

    #[test]
    fn register_operation_signs_new_context_only() {
        let sk = SigningKey::generate(&mut OsRng);
        let op = new_sign(&sk, make_operation(b"alice", &profile_for(&sk, 0)));

        assert!(op.old_profile_signature.is_none());
        assert!(verify_new_signature(&sk.verifying_key(), &op));

        // The signature is useless under any other context.
        let signature = op.new_profile_signature.clone().unwrap();
        assert!(!verify_with_context(
            &sk.verifying_key(),
            OLD_PROFILE_CONTEXT,
            &op.profile_operation,
            &signature
        ));
    }

    #[test]
    fn modify_double_signs_with_one_key() {
        let sk = SigningKey::generate(&mut OsRng);
        let op = new_sign(&sk, old_sign(&sk, make_operation(b"alice", &profile_for(&sk, 3))));
        let vk = sk.verifying_key();
        assert!(verify_old_signature(&vk, &op));
        assert!(verify_new_signature(&vk, &op));
    }

    #[test]
    fn transfer_proposal_then_accept() {
        let old_key = SigningKey::generate(&mut OsRng);
        let new_key = SigningKey::generate(&mut OsRng);
        let profile = profile_for(&new_key, 4);

        let proposal = transfer_proposal(&old_key, b"carol", &profile);
        assert!(verify_old_signature(&old_key.verifying_key(), &proposal));
        assert!(proposal.new_profile_signature.is_none());

        let accepted = new_sign(&new_key, proposal.clone());
        // The old signature is untouched and still verifies.
        assert_eq!(
            accepted.old_profile_signature,
            proposal.old_profile_signature
        );
        assert!(verify_old_signature(&old_key.verifying_key(), &accepted));
        assert!(verify_new_signature(&new_key.verifying_key(), &accepted));
        // And neither signature verifies under the other party's key.
        assert!(!verify_old_signature(&new_key.verifying_key(), &accepted));
        assert!(!verify_new_signature(&old_key.verifying_key(), &accepted));
    }

    #[test]
    fn body_decodes_back_to_name_and_profile() {
        let sk = SigningKey::generate(&mut OsRng);
        let profile = profile_for(&sk, 7);
        let op = make_operation(b"dave", &profile);
        let body = decode_operation(&op).unwrap();
        assert_eq!(body.name, b"dave");
        let decoded = Profile::decode(body.new_profile.as_slice()).unwrap();
        assert_eq!(decoded.version, Some(7));
    }

    #[test]
    fn missing_signatures_do_not_verify() {
        let sk = SigningKey::generate(&mut OsRng);
        let op = make_operation(b"erin", &profile_for(&sk, 0));
        assert!(!verify_old_signature(&sk.verifying_key(), &op));
        assert!(!verify_new_signature(&sk.verifying_key(), &op));
    }
}

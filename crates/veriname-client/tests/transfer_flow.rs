//! End-to-end ownership transfer: the current holder proposes, the
//! recipient accepts, and an update server that enforces the uniform
//! two-signature rule adjudicates the result.

mod common;

use ed25519_dalek::SigningKey;
use prost::Message;
use rand::rngs::OsRng;

use common::{client_for, serve_one, Verifier, NOW};
use veriname_client::ClientError;
use veriname_core::operation::{
    decode_operation, transfer_proposal, verify_new_signature, verify_old_signature,
};
use veriname_core::profile::MAX_VALIDITY_PERIOD_SECS;
use veriname_core::wire::{ClientReply, Profile, PublicKey, ReplyStatus};

fn profile_owned_by(key: &SigningKey) -> Profile {
    Profile {
        signature_key: Some(PublicKey::from_ed25519(key.verifying_key().to_bytes())),
        version: Some(5),
        expiration_time: Some(NOW + MAX_VALIDITY_PERIOD_SECS - 100),
    }
}

/// An update server that applies the rule real servers apply: the old
/// signature must verify under the key currently holding the name, and the
/// new signature under the key inside the proposed profile.
async fn adjudicating_server(current_holder: ed25519_dalek::VerifyingKey) -> veriname_core::config::ServerEndpoint {
    serve_one(move |request| {
        let Some(op) = request.modify_profile else {
            return ClientReply {
                status: Some(ReplyStatus::NotAuthorized as i32),
                ..ClientReply::default()
            };
        };
        let authorized = verify_old_signature(&current_holder, &op)
            && decode_operation(&op)
                .ok()
                .and_then(|body| Profile::decode(body.new_profile.as_slice()).ok())
                .and_then(|profile| profile.ed25519_key())
                .is_some_and(|new_key| verify_new_signature(&new_key, &op));
        ClientReply {
            status: Some(if authorized {
                ReplyStatus::Ok as i32
            } else {
                ReplyStatus::NotAuthorized as i32
            }),
            ..ClientReply::default()
        }
    })
    .await
}

#[tokio::test]
async fn proposal_and_acceptance_carry_the_right_signatures() {
    let old_key = SigningKey::generate(&mut OsRng);
    let new_key = SigningKey::generate(&mut OsRng);
    let profile = profile_owned_by(&new_key);

    let proposal = transfer_proposal(&old_key, b"carol", &profile);
    assert!(verify_old_signature(&old_key.verifying_key(), &proposal));
    assert!(proposal.new_profile_signature.is_none());

    let verifier = Verifier::new("a");
    let endpoint = adjudicating_server(old_key.verifying_key()).await;
    let client = client_for(&[&verifier], vec![endpoint], 1, 1);

    client.accept_transfer(&new_key, proposal).await.unwrap();
}

#[tokio::test]
async fn acceptance_with_the_wrong_key_is_rejected() {
    let old_key = SigningKey::generate(&mut OsRng);
    let new_key = SigningKey::generate(&mut OsRng);
    let interloper = SigningKey::generate(&mut OsRng);
    // The proposed profile names new_key; the interloper signs anyway.
    let proposal = transfer_proposal(&old_key, b"carol", &profile_owned_by(&new_key));

    let verifier = Verifier::new("a");
    let endpoint = adjudicating_server(old_key.verifying_key()).await;
    let client = client_for(&[&verifier], vec![endpoint], 1, 1);

    let err = client
        .accept_transfer(&interloper, proposal)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAuthorized));
}

#[tokio::test]
async fn register_carries_invite_and_new_signature_only() {
    let key = SigningKey::generate(&mut OsRng);
    let profile = Profile {
        signature_key: Some(PublicKey::from_ed25519(key.verifying_key().to_bytes())),
        version: Some(0),
        expiration_time: Some(NOW + MAX_VALIDITY_PERIOD_SECS - 100),
    };

    let (sent, received) = tokio::sync::oneshot::channel();
    let endpoint = serve_one(move |request| {
        let _ = sent.send(request);
        ClientReply {
            status: Some(ReplyStatus::Ok as i32),
            ..ClientReply::default()
        }
    })
    .await;
    let verifier = Verifier::new("a");
    let client = client_for(&[&verifier], vec![endpoint], 1, 1);

    client
        .register(&key, "dave", &profile, Some(b"golden-ticket".to_vec()))
        .await
        .unwrap();

    let request = received.await.unwrap();
    assert_eq!(request.invite_code.as_deref(), Some(&b"golden-ticket"[..]));
    let op = request.modify_profile.unwrap();
    assert!(op.old_profile_signature.is_none());
    assert!(verify_new_signature(&key.verifying_key(), &op));
    let body = decode_operation(&op).unwrap();
    assert_eq!(body.name, b"dave");
}

#[tokio::test]
async fn modify_is_double_signed_with_one_key() {
    let key = SigningKey::generate(&mut OsRng);
    let profile = profile_owned_by(&key);

    let verifier = Verifier::new("a");
    let endpoint = adjudicating_server(key.verifying_key()).await;
    let client = client_for(&[&verifier], vec![endpoint], 1, 1);

    client.modify(&key, "erin", &profile).await.unwrap();
}

//! Domain-separated Ed25519 signing.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Context for the current holder's signature on a profile operation.
pub const OLD_PROFILE_CONTEXT: &[u8] = b"ModifyProfileOld\x00";

/// Context for the new holder's signature on a profile operation.
pub const NEW_PROFILE_CONTEXT: &[u8] = b"ModifyProfileNew\x00";

/// Context for a server's signature on a state-root statement.
pub const SERVER_MESSAGE_CONTEXT: &[u8] = b"msg\x00";

/// Ed25519 signature length in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// On-disk signing keypair length: 32-byte seed followed by the 32-byte
/// public half.
pub const SIGNING_KEYPAIR_SIZE: usize = 64;

/// Transport (session) key length in bytes.
pub const TRANSPORT_KEY_SIZE: usize = 32;

/// Signs `context ‖ message` with `key`.
#[must_use]
pub fn sign_with_context(key: &SigningKey, context: &[u8], message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(context.len() + message.len());
    buf.extend_from_slice(context);
    buf.extend_from_slice(message);
    key.sign(&buf).to_bytes().to_vec()
}

/// Verifies `signature` over `context ‖ message` under `key`.
///
/// Malformed signature bytes verify as `false` rather than erroring: in
/// every call site a bad signature means "this statement contributes
/// nothing", never "abort".
#[must_use]
pub fn verify_with_context(
    key: &VerifyingKey,
    context: &[u8],
    message: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let mut buf = Vec::with_capacity(context.len() + message.len());
    buf.extend_from_slice(context);
    buf.extend_from_slice(message);
    key.verify(&buf, &signature).is_ok()
}

//! Shared harness for end-to-end client tests: consensus verifiers with
//! real keys, and single-shot directory servers speaking the actual padded
//! Noise transport.

#![allow(dead_code)] // each test binary uses a different slice of this

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use prost::Message;
use rand::rngs::OsRng;
use tokio::net::TcpListener;

use veriname_client::transport::{generate_transport_keypair, SecureSession};
use veriname_client::ClientBuilder;
use veriname_core::config::{ClientConfig, ServerEndpoint, VerifierDescriptor, VerifierSet};
use veriname_core::crypto::{sign_with_context, SERVER_MESSAGE_CONTEXT};
use veriname_core::time::FixedClock;
use veriname_core::wire::{
    pad, unpad, ClientMessage, ClientReply, PublicKey, ServerMessage, SignedServerMessage,
    UPDATE_REQUEST_SIZE,
};

/// Pinned "now" for every test clock.
pub const NOW: u64 = 1_700_000_000;

/// A consensus server identity with a real signing key.
pub struct Verifier {
    pub name: &'static str,
    pub key: SigningKey,
}

impl Verifier {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn descriptor(&self) -> VerifierDescriptor {
        VerifierDescriptor {
            name: self.name.into(),
            public_key: PublicKey::from_ed25519(self.key.verifying_key().to_bytes()),
        }
    }

    pub fn id(&self) -> u64 {
        self.descriptor().id()
    }

    /// Signs a state-root statement the way a real server does.
    pub fn confirm(&self, root: &[u8], time: u64) -> SignedServerMessage {
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

/// Spawns a directory server that performs the responder handshake,
/// answers exactly one request with `reply` (padded to whatever the
/// request asked for), and exits. Returns the endpoint to dial.
pub async fn spawn_reply_server(reply: ClientReply) -> ServerEndpoint {
    serve_one(move |_request| reply).await
}

/// Spawns a single-shot directory server whose reply is computed from the
/// decoded request.
pub async fn serve_one<F>(respond: F) -> ServerEndpoint
where
    F: FnOnce(ClientMessage) -> ClientReply + Send + 'static,
{
    let (secret, public) = generate_transport_keypair().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut session) = SecureSession::accept(stream, &secret).await else {
            return;
        };
        let Ok(frame) = session.read_frame().await else {
            return;
        };
        let request = ClientMessage::decode(unpad(&frame).unwrap()).unwrap();
        let pad_to = request
            .pad_reply_to
            .unwrap_or(UPDATE_REQUEST_SIZE as u64)
            .try_into()
            .unwrap();
        let reply = respond(request);
        let padded = pad(&reply.encode_to_vec(), pad_to).unwrap();
        let _ = session.write_frame(&padded).await;
    });

    endpoint(address, public)
}

/// An endpoint that nothing listens on; dials fail fast with a refusal.
pub fn dead_endpoint() -> ServerEndpoint {
    endpoint("127.0.0.1:9".into(), [0u8; 32])
}

pub fn endpoint(address: String, transport_public_key: [u8; 32]) -> ServerEndpoint {
    ServerEndpoint {
        address,
        timeout: Duration::from_secs(5),
        transport_public_key,
    }
}

/// Client over `endpoints` (used for both lookups and updates), pinned to
/// [`NOW`], thresholds `consensus`/`fresh`, freshness window 60 seconds.
pub fn client_for(
    verifiers: &[&Verifier],
    endpoints: Vec<ServerEndpoint>,
    consensus: u32,
    fresh: u32,
) -> veriname_client::Client {
    let config = ClientConfig {
        verifiers: VerifierSet::new(verifiers.iter().map(|v| v.descriptor())),
        lookup_servers: endpoints.clone(),
        update_servers: endpoints,
        consensus_signatures_required: consensus,
        freshness_signatures_required: fresh,
        freshness_threshold: Duration::from_secs(60),
    };
    ClientBuilder::new(config)
        .clock(Arc::new(FixedClock::new(NOW)))
        .build()
}

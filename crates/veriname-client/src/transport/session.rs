//! Mutually-keyed secure sessions.
//!
//! A session wraps a TCP stream in two layers: the length-prefixed
//! [`FrameCodec`] and a Noise transport state derived from a fresh
//! ephemeral key and the server's pre-configured static key. The pattern is
//! NK: the initiator pins the responder's static key and stays anonymous.
//!
//! ```text
//! NK:
//!   <- s
//!   ...
//!   -> e, es
//!   <- e, ee
//! ```
//!
//! After the two handshake frames, [`SecureSession::write_frame`] and
//! [`SecureSession::read_frame`] exchange AEAD-sealed frames with a 4 KiB
//! plaintext ceiling. Callers are expected to pad payloads to a fixed
//! envelope (see `veriname_core::wire::padding`) before writing.

use futures::{SinkExt, StreamExt};
use snow::Builder;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use super::framing::FrameCodec;
use super::TransportError;

/// Plaintext ceiling per frame.
pub const MAX_PLAINTEXT_FRAME: usize = 4096;

/// AEAD tag length appended to each frame by the Noise transport.
pub(crate) const AEAD_TAG_SIZE: usize = 16;

/// Ciphertext ceiling per frame.
pub(crate) const MAX_WIRE_FRAME: usize = MAX_PLAINTEXT_FRAME + AEAD_TAG_SIZE;

const NOISE_PARAMS: &str = "Noise_NK_25519_ChaChaPoly_BLAKE2s";

/// An established, authenticated, confidential, length-framed session.
pub struct SecureSession {
    framed: Framed<TcpStream, FrameCodec>,
    noise: snow::TransportState,
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession").finish_non_exhaustive()
    }
}

impl SecureSession {
    /// Performs the initiator handshake against a server whose static
    /// transport key is already known.
    ///
    /// # Errors
    ///
    /// Fails on socket errors, on a peer that closes mid-handshake, or on
    /// any Noise failure, including a responder that does not hold the
    /// private half of `remote_static`.
    pub async fn connect(
        stream: TcpStream,
        remote_static: &[u8; 32],
    ) -> Result<Self, TransportError> {
        let params = NOISE_PARAMS.parse().map_err(snow::Error::from)?;
        let mut handshake = Builder::new(params)
            .remote_public_key(remote_static)
            .build_initiator()?;
        let mut framed = Framed::new(stream, FrameCodec::new());

        let mut buf = vec![0u8; MAX_WIRE_FRAME];
        let len = handshake.write_message(&[], &mut buf)?;
        framed.send(bytes::Bytes::copy_from_slice(&buf[..len])).await?;

        let reply = framed
            .next()
            .await
            .ok_or(TransportError::ConnectionClosed)??;
        let mut payload = vec![0u8; MAX_WIRE_FRAME];
        handshake.read_message(&reply, &mut payload)?;

        Ok(Self {
            framed,
            noise: handshake.into_transport_mode()?,
        })
    }

    /// Performs the responder handshake with the local static transport
    /// key. This is the server collaborator's half; the client crate keeps
    /// it so integration tests can stand up real endpoints in-process.
    ///
    /// # Errors
    ///
    /// Same failure classes as [`SecureSession::connect`].
    pub async fn accept(
        stream: TcpStream,
        local_static_secret: &[u8; 32],
    ) -> Result<Self, TransportError> {
        let params = NOISE_PARAMS.parse().map_err(snow::Error::from)?;
        let mut handshake = Builder::new(params)
            .local_private_key(local_static_secret)
            .build_responder()?;
        let mut framed = Framed::new(stream, FrameCodec::new());

        let first = framed
            .next()
            .await
            .ok_or(TransportError::ConnectionClosed)??;
        let mut payload = vec![0u8; MAX_WIRE_FRAME];
        handshake.read_message(&first, &mut payload)?;

        let mut buf = vec![0u8; MAX_WIRE_FRAME];
        let len = handshake.write_message(&[], &mut buf)?;
        framed.send(bytes::Bytes::copy_from_slice(&buf[..len])).await?;

        Ok(Self {
            framed,
            noise: handshake.into_transport_mode()?,
        })
    }

    /// Seals and sends one frame.
    ///
    /// # Errors
    ///
    /// Fails if the plaintext exceeds the frame ceiling or on socket/AEAD
    /// errors.
    pub async fn write_frame(&mut self, plaintext: &[u8]) -> Result<(), TransportError> {
        if plaintext.len() > MAX_PLAINTEXT_FRAME {
            return Err(TransportError::FrameTooLarge {
                size: plaintext.len(),
                max: MAX_PLAINTEXT_FRAME,
            });
        }
        let mut buf = vec![0u8; plaintext.len() + AEAD_TAG_SIZE];
        let len = self.noise.write_message(plaintext, &mut buf)?;
        buf.truncate(len);
        self.framed.send(bytes::Bytes::from(buf)).await
    }

    /// Receives and opens one frame.
    ///
    /// # Errors
    ///
    /// Fails on a closed or errored socket, a frame too short to carry an
    /// AEAD tag, or a frame that does not authenticate.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let frame = self
            .framed
            .next()
            .await
            .ok_or(TransportError::ConnectionClosed)??;
        if frame.len() < AEAD_TAG_SIZE {
            return Err(TransportError::FrameTooShort {
                size: frame.len(),
                min: AEAD_TAG_SIZE,
            });
        }
        let mut buf = vec![0u8; frame.len()];
        let len = self.noise.read_message(&frame, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

/// Generates a fresh static transport keypair `(secret, public)`.
///
/// Servers run this once at provisioning time; tests use it to stand up
/// endpoints with pinned keys.
///
/// # Errors
///
/// Propagates the Noise provider's RNG failure, which does not happen on
/// platforms with a working OS RNG.
pub fn generate_transport_keypair() -> Result<([u8; 32], [u8; 32]), TransportError> {
    let params = NOISE_PARAMS.parse().map_err(snow::Error::from)?;
    let keypair = Builder::new(params).generate_keypair()?;
    let secret: [u8; 32] = keypair
        .private
        .as_slice()
        .try_into()
        .map_err(|_| snow::Error::Input)?;
    let public: [u8; 32] = keypair
        .public
        .as_slice()
        .try_into()
        .map_err(|_| snow::Error::Input)?;
    Ok((secret, public))
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    async fn session_pair() -> (SecureSession, SecureSession) {
        let (secret, public) = generate_transport_keypair().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            SecureSession::accept(stream, &secret).await.unwrap()
        });
        let client = SecureSession::connect(TcpStream::connect(addr).await.unwrap(), &public)
            .await
            .unwrap();
        (client, server.await.unwrap())
    }

    #[tokio::test]
    async fn frames_roundtrip_both_directions() {
        let (mut client, mut server) = session_pair().await;

        client.write_frame(b"ping").await.unwrap();
        assert_eq!(server.read_frame().await.unwrap(), b"ping");

        server.write_frame(b"pong").await.unwrap();
        assert_eq!(client.read_frame().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn plaintext_ceiling_enforced_on_write() {
        let (mut client, _server) = session_pair().await;
        let oversized = vec![0u8; MAX_PLAINTEXT_FRAME + 1];
        assert!(matches!(
            client.write_frame(&oversized).await,
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn full_envelope_fits() {
        let (mut client, mut server) = session_pair().await;
        let envelope = vec![0x42u8; MAX_PLAINTEXT_FRAME];
        client.write_frame(&envelope).await.unwrap();
        assert_eq!(server.read_frame().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn wrong_pinned_key_fails_handshake() {
        let (secret, _public) = generate_transport_keypair().unwrap();
        let (_other_secret, other_public) = generate_transport_keypair().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // The responder fails to open the initiator's es-encrypted
            // handshake payload; either side may surface the error first.
            let _ = SecureSession::accept(stream, &secret).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        assert!(SecureSession::connect(stream, &other_public).await.is_err());
    }
}

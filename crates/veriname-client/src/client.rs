//! The client orchestrator.
//!
//! A [`Client`] walks its configured endpoint lists in order, opens one
//! secure session per attempt, and classifies every outcome as either
//! *authoritative* (the server answered; surface the result, even a
//! failure) or *connectivity* (try the next endpoint, remember the error).
//!
//! Lookups verify in three stages before a profile is believed: the
//! confirmation set must establish a consensus root, the witness must prove
//! the name's presence or absence under that root, and the validity gate
//! must pass (or flag the profile as near expiry, in which case the
//! profile is still returned inside [`ClientError::OutOfDate`]).
//!
//! One `Client` value is safe to share across tasks: all of its state is
//! immutable after construction and every call owns its connection for
//! exactly the duration of the call.

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use futures::future::BoxFuture;
use futures::FutureExt;
use prost::Message;
use tokio::time::timeout;
use tracing::{debug, warn};

use veriname_core::config::{ClientConfig, ServerEndpoint};
use veriname_core::consensus::{ConsensusError, ConsensusVerifier};
use veriname_core::operation::{make_operation, new_sign, old_sign};
use veriname_core::profile::check_expiration;
use veriname_core::time::{Clock, SystemClock};
use veriname_core::wire::{
    pad, unpad, ClientMessage, ClientReply, Profile, ReplyStatus, SignedProfileOperation,
    SignedServerMessage, LOOKUP_REQUEST_SIZE, UPDATE_REQUEST_SIZE,
};
use veriname_core::witness::verify_resolve_against_root;

use crate::error::ClientError;
use crate::transport::{Dialer, SecureSession, TcpDialer, TransportError};

/// What one per-server attempt produced. The `bool` is the authoritative
/// flag: `true` means the server answered and the result stands, `false`
/// means the next endpoint should be tried.
type Attempt<'a, R> = BoxFuture<'a, (bool, Result<R, ClientError>)>;

/// Builder for [`Client`]; lets tests swap the dialer and the clock.
pub struct ClientBuilder {
    config: ClientConfig,
    dialer: Arc<dyn Dialer>,
    clock: Arc<dyn Clock>,
}

impl ClientBuilder {
    /// Starts from a validated configuration with the direct TCP dialer
    /// and the system clock.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            dialer: Arc::new(TcpDialer),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the outbound dialer.
    #[must_use]
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the immutable client.
    #[must_use]
    pub fn build(self) -> Client {
        let consensus = ConsensusVerifier::new(
            self.config.verifiers,
            self.config.consensus_signatures_required,
            self.config.freshness_signatures_required,
            self.config.freshness_threshold,
            Arc::clone(&self.clock),
        );
        Client {
            consensus,
            lookup_servers: self.config.lookup_servers,
            update_servers: self.config.update_servers,
            dialer: self.dialer,
            clock: self.clock,
        }
    }
}

/// A verified-lookup directory client.
pub struct Client {
    consensus: ConsensusVerifier,
    lookup_servers: Vec<ServerEndpoint>,
    update_servers: Vec<ServerEndpoint>,
    dialer: Arc<dyn Dialer>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("consensus", &self.consensus)
            .field("lookup_servers", &self.lookup_servers.len())
            .field("update_servers", &self.update_servers.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds a client with the default dialer and clock.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder::new(config).build()
    }

    /// Looks up `name`, returning its verified profile or `None` for a
    /// proven absence.
    ///
    /// Success guarantees that at least the configured number of distinct
    /// verifiers signed the state-root the answer was proven under, and
    /// that enough of those signatures are recent.
    ///
    /// # Errors
    ///
    /// [`ClientError::OutOfDate`] still carries the verified profile; see
    /// [`ClientError`] for the full taxonomy.
    pub async fn lookup(&self, name: &str) -> Result<Option<Profile>, ClientError> {
        self.lookup_reply(name).await.map(|(profile, _)| profile)
    }

    /// Like [`Client::lookup`], additionally returning the raw reply so
    /// the caller can archive it or re-verify it offline with
    /// [`Client::lookup_from_reply`].
    ///
    /// # Errors
    ///
    /// As for [`Client::lookup`].
    pub async fn lookup_reply(
        &self,
        name: &str,
    ) -> Result<(Option<Profile>, ClientReply), ClientError> {
        let request = ClientMessage {
            peek_state: Some(true),
            resolve_name: Some(name.as_bytes().to_vec()),
            pad_reply_to: Some(UPDATE_REQUEST_SIZE as u64),
            ..ClientMessage::default()
        };
        let padded = pad(&request.encode_to_vec(), LOOKUP_REQUEST_SIZE)
            .map_err(ClientError::RequestTooLarge)?;

        self.at_some_server(&self.lookup_servers, |mut session| {
            let padded = padded.clone();
            async move {
                if let Err(err) = session.write_frame(&padded).await {
                    return (false, Err(err.into()));
                }
                let frame = match session.read_frame().await {
                    Ok(frame) => frame,
                    Err(err) => return (false, Err(err.into())),
                };
                let reply = match decode_reply(&frame) {
                    Ok(reply) => reply,
                    Err(err) => return (false, Err(err)),
                };
                // A decodable reply is an authoritative answer. If its
                // verification fails, that failure is the result; another
                // server would not make this reply any truer.
                let outcome = self
                    .lookup_from_reply(name, &reply)
                    .map(|profile| (profile, reply));
                (true, outcome)
            }
            .boxed()
        })
        .await
    }

    /// Runs the whole verification pipeline over an already-received
    /// reply: consensus, then the witness, then the validity gate. Pure
    /// given the injected clock.
    ///
    /// # Errors
    ///
    /// As for [`Client::lookup`].
    pub fn lookup_from_reply(
        &self,
        name: &str,
        reply: &ClientReply,
    ) -> Result<Option<Profile>, ClientError> {
        let root = self.consensus.verify(&reply.state_confirmations)?;
        let resolved =
            verify_resolve_against_root(&root, name.as_bytes(), reply.lookup_nodes.as_ref())?;
        let Some(bytes) = resolved else {
            return Ok(None);
        };
        let profile = Profile::decode(bytes.as_slice())?;
        match check_expiration(&profile, self.clock.now_secs()) {
            Ok(()) => Ok(Some(profile)),
            Err(cause) => Err(ClientError::OutOfDate {
                profile: Box::new(profile),
                cause,
            }),
        }
    }

    /// Verifies a confirmation set against this client's verifier set and
    /// thresholds, returning the agreed state-root.
    ///
    /// # Errors
    ///
    /// See [`ConsensusError`].
    pub fn verify_consensus(
        &self,
        confirmations: &[SignedServerMessage],
    ) -> Result<Vec<u8>, ConsensusError> {
        self.consensus.verify(confirmations)
    }

    /// Submits a fully assembled operation to some update server. Most
    /// callers want [`Client::register`], [`Client::modify`] or
    /// [`Client::accept_transfer`] instead.
    ///
    /// # Errors
    ///
    /// Status-class errors ([`ClientError::RegistrationDisabled`],
    /// [`ClientError::InviteInvalid`], [`ClientError::InviteUsed`],
    /// [`ClientError::NotAuthorized`], [`ClientError::UnknownStatus`]) are
    /// authoritative; [`ClientError::Connectivity`] means no server
    /// answered at all.
    pub async fn enact(
        &self,
        op: SignedProfileOperation,
        invite: Option<Vec<u8>>,
    ) -> Result<(), ClientError> {
        let request = ClientMessage {
            modify_profile: Some(op),
            invite_code: invite,
            ..ClientMessage::default()
        };
        let padded = pad(&request.encode_to_vec(), UPDATE_REQUEST_SIZE)
            .map_err(ClientError::RequestTooLarge)?;

        self.at_some_server(&self.update_servers, |mut session| {
            let padded = padded.clone();
            async move {
                if let Err(err) = session.write_frame(&padded).await {
                    return (false, Err(err.into()));
                }
                let frame = match session.read_frame().await {
                    Ok(frame) => frame,
                    Err(err) => return (false, Err(err.into())),
                };
                let reply = match decode_reply(&frame) {
                    Ok(reply) => reply,
                    Err(err) => return (false, Err(err)),
                };
                let code = reply.status_code();
                let outcome = match ReplyStatus::try_from(code) {
                    Ok(ReplyStatus::Ok) => Ok(()),
                    Ok(ReplyStatus::RegistrationDisabled) => {
                        Err(ClientError::RegistrationDisabled)
                    }
                    Ok(ReplyStatus::InviteInvalid) => Err(ClientError::InviteInvalid),
                    Ok(ReplyStatus::InviteUsed) => Err(ClientError::InviteUsed),
                    Ok(ReplyStatus::NotAuthorized) => Err(ClientError::NotAuthorized),
                    Err(_) => Err(ClientError::UnknownStatus { code }),
                };
                (true, outcome)
            }
            .boxed()
        })
        .await
    }

    /// Claims a previously unregistered name. The invite convinces the
    /// server that a new name is allowed; it is not bound into the profile
    /// in any way. `profile.version`, if set, must be 0.
    ///
    /// # Errors
    ///
    /// As for [`Client::enact`].
    pub async fn register(
        &self,
        key: &SigningKey,
        name: &str,
        profile: &Profile,
        invite: Option<Vec<u8>>,
    ) -> Result<(), ClientError> {
        self.enact(new_sign(key, make_operation(name.as_bytes(), profile)), invite)
            .await
    }

    /// Replaces the profile of a name the key already holds. The caller
    /// must set `profile.version` strictly greater than the registered
    /// version (by convention one more) and will usually also push the
    /// expiration out to just under a year.
    ///
    /// # Errors
    ///
    /// As for [`Client::enact`].
    pub async fn modify(
        &self,
        key: &SigningKey,
        name: &str,
        profile: &Profile,
    ) -> Result<(), ClientError> {
        let op = new_sign(key, old_sign(key, make_operation(name.as_bytes(), profile)));
        self.enact(op, None).await
    }

    /// Completes a transfer proposal (see
    /// [`veriname_core::operation::transfer_proposal`]) with the
    /// recipient's key, binding the name to the proposed profile.
    ///
    /// # Errors
    ///
    /// As for [`Client::enact`].
    pub async fn accept_transfer(
        &self,
        key: &SigningKey,
        op: SignedProfileOperation,
    ) -> Result<(), ClientError> {
        self.enact(new_sign(key, op), None).await
    }

    /// Tries `f` against each endpoint in order until one answers
    /// authoritatively. Dial, handshake and the entire exchange run under
    /// the endpoint's single deadline; there is no separate connect
    /// timeout. Each attempt's connection lives inside the attempt and is
    /// released before the next one starts.
    async fn at_some_server<'a, R, F>(
        &'a self,
        servers: &'a [ServerEndpoint],
        mut f: F,
    ) -> Result<R, ClientError>
    where
        R: 'a,
        F: FnMut(SecureSession) -> Attempt<'a, R>,
    {
        let mut last: Option<ClientError> = None;
        for endpoint in servers {
            let exchange = timeout(endpoint.timeout, async {
                let stream = self
                    .dialer
                    .dial(&endpoint.address)
                    .await
                    .map_err(TransportError::Io)?;
                let session =
                    SecureSession::connect(stream, &endpoint.transport_public_key).await?;
                Ok::<_, TransportError>(f(session).await)
            })
            .await;

            match exchange {
                Err(_) => {
                    warn!(address = %endpoint.address, "endpoint deadline elapsed");
                    last = Some(
                        TransportError::Timeout {
                            address: endpoint.address.clone(),
                            timeout: endpoint.timeout,
                        }
                        .into(),
                    );
                }
                Ok(Err(err)) => {
                    warn!(address = %endpoint.address, error = %err, "endpoint unreachable");
                    last = Some(err.into());
                }
                Ok(Ok((done, result))) => {
                    if done {
                        return result;
                    }
                    if let Err(err) = result {
                        debug!(address = %endpoint.address, error = %err, "inconclusive answer");
                        last = Some(err);
                    }
                }
            }
        }
        Err(last.unwrap_or(ClientError::Connectivity {
            last: TransportError::NoEndpoints,
        }))
    }
}

fn decode_reply(frame: &[u8]) -> Result<ClientReply, ClientError> {
    let body = unpad(frame)?;
    Ok(ClientReply::decode(body)?)
}

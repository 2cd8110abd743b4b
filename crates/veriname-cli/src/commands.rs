//! Command implementations.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::SigningKey;
use prost::Message;
use rand::rngs::OsRng;

use veriname_client::{Client, ClientError};
use veriname_core::config::ClientConfigFile;
use veriname_core::crypto::read_signing_key;
use veriname_core::operation::transfer_proposal;
use veriname_core::wire::{Profile, PublicKey, SignedProfileOperation};

fn load_client(config: &Path) -> Result<Client> {
    let raw = std::fs::read_to_string(config)
        .with_context(|| format!("read config {}", config.display()))?;
    let file: ClientConfigFile =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", config.display()))?;
    Ok(Client::new(file.parse()?))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn print_profile(name: &str, profile: &Profile) {
    println!("name:        {name}");
    println!("version:     {}", profile.version.unwrap_or(0));
    println!("expires:     {}", profile.expiration_time.unwrap_or(0));
    match profile.signature_key.as_ref().and_then(|k| k.ed25519.as_deref()) {
        Some(key) => println!("signing key: {}", hex::encode(key)),
        None => println!("signing key: (none)"),
    }
}

pub async fn lookup(config: &Path, name: &str) -> Result<()> {
    let client = load_client(config)?;
    match client.lookup(name).await {
        Ok(Some(profile)) => {
            print_profile(name, &profile);
            Ok(())
        }
        Ok(None) => {
            println!("{name} is not registered");
            Ok(())
        }
        Err(err) if err.is_out_of_date() => {
            // Still verified; print it, then the warning.
            if let Some(profile) = err.out_of_date_profile() {
                print_profile(name, profile);
            }
            eprintln!("warning: {err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

pub fn keygen(out: &Path) -> Result<()> {
    let key = SigningKey::generate(&mut OsRng);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(out)
        .with_context(|| format!("create {}", out.display()))?;
    file.write_all(&key.to_keypair_bytes())?;

    let public = PublicKey::from_ed25519(key.verifying_key().to_bytes());
    println!("public key: {}", BASE64.encode(public.encode_to_vec()));
    println!("server id:  {}", public.id());
    Ok(())
}

fn profile_with(key: &SigningKey, version: u64, expire_days: u64) -> Profile {
    Profile {
        signature_key: Some(PublicKey::from_ed25519(key.verifying_key().to_bytes())),
        version: Some(version),
        expiration_time: Some(now_secs() + expire_days * 24 * 60 * 60),
    }
}

pub async fn register(
    config: &Path,
    name: &str,
    key: &Path,
    invite: Option<&str>,
    expire_days: u64,
) -> Result<()> {
    let client = load_client(config)?;
    let key = read_signing_key(key)?;
    let invite = invite
        .map(|raw| BASE64.decode(raw).context("invite is not valid base64"))
        .transpose()?;
    client
        .register(&key, name, &profile_with(&key, 0, expire_days), invite)
        .await?;
    println!("registered {name}");
    Ok(())
}

/// Fetches the currently registered version of `name`, tolerating a
/// near-expiry profile (refreshing one is the whole point of `modify`).
async fn current_version(client: &Client, name: &str) -> Result<u64> {
    match client.lookup(name).await {
        Ok(Some(profile)) => Ok(profile.version.unwrap_or(0)),
        Ok(None) => bail!("{name} is not registered"),
        Err(err) => match err.out_of_date_profile() {
            Some(profile) => Ok(profile.version.unwrap_or(0)),
            None => Err(err.into()),
        },
    }
}

pub async fn modify(config: &Path, name: &str, key: &Path, expire_days: u64) -> Result<()> {
    let client = load_client(config)?;
    let key = read_signing_key(key)?;
    let version = current_version(&client, name).await? + 1;
    client
        .modify(&key, name, &profile_with(&key, version, expire_days))
        .await?;
    println!("updated {name} to version {version}");
    Ok(())
}

pub async fn transfer_propose(
    config: &Path,
    name: &str,
    key: &Path,
    recipient: &str,
    out: &Path,
    expire_days: u64,
) -> Result<()> {
    let client = load_client(config)?;
    let key = read_signing_key(key)?;
    let recipient_bytes = BASE64
        .decode(recipient)
        .context("recipient key is not valid base64")?;
    let recipient_key = PublicKey::decode(recipient_bytes.as_slice())
        .context("recipient key is not a valid key message")?;
    if recipient_key.ed25519_key().is_none() {
        bail!("recipient key carries no usable Ed25519 key");
    }

    let version = current_version(&client, name).await? + 1;
    let profile = Profile {
        signature_key: Some(recipient_key),
        version: Some(version),
        expiration_time: Some(now_secs() + expire_days * 24 * 60 * 60),
    };
    let proposal = transfer_proposal(&key, name.as_bytes(), &profile);
    std::fs::write(out, proposal.encode_to_vec())
        .with_context(|| format!("write {}", out.display()))?;
    println!("proposal for {name} written to {}", out.display());
    Ok(())
}

pub async fn transfer_accept(config: &Path, key: &Path, proposal: &Path) -> Result<()> {
    let client = load_client(config)?;
    let key = read_signing_key(key)?;
    let bytes = std::fs::read(proposal)
        .with_context(|| format!("read proposal {}", proposal.display()))?;
    let op = SignedProfileOperation::decode(bytes.as_slice())
        .context("proposal file is not a valid operation")?;
    match client.accept_transfer(&key, op).await {
        Ok(()) => {
            println!("transfer accepted");
            Ok(())
        }
        Err(ClientError::NotAuthorized) => {
            bail!("transfer rejected: the proposal does not authorise this key")
        }
        Err(err) => Err(err.into()),
    }
}

//! Permission-checked key file loading.
//!
//! Both the 64-byte Ed25519 signing keypair and the 32-byte transport key
//! live in plain files. A key file must be a regular file with no group or
//! other permission bits set; anything else is refused before a byte is
//! read. Secret bytes are held in [`Zeroizing`] buffers so they are wiped
//! when dropped.

use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use ed25519_dalek::SigningKey;
use thiserror::Error;
use zeroize::Zeroizing;

use super::sign::{SIGNING_KEYPAIR_SIZE, TRANSPORT_KEY_SIZE};

/// Errors from key file loading.
#[derive(Debug, Error)]
pub enum KeyfileError {
    /// I/O error while reading the file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The path does not name a regular file.
    #[error("{path} is not a regular file")]
    NotRegularFile {
        /// The offending path.
        path: String,
    },

    /// The file is readable by group or other.
    #[error("{path} is unprotected (group/other bits set)")]
    InsecurePermissions {
        /// The offending path.
        path: String,
    },

    /// The file does not hold exactly the expected number of bytes.
    #[error("{path}: expected a {expected}-byte key, got {got} bytes")]
    WrongLength {
        /// The offending path.
        path: String,
        /// Expected key length.
        expected: usize,
        /// Actual file length.
        got: usize,
    },

    /// The bytes do not form a consistent Ed25519 keypair.
    #[error("{path}: malformed signing keypair")]
    MalformedKey {
        /// The offending path.
        path: String,
    },
}

fn check_protected(path: &Path) -> Result<(), KeyfileError> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(KeyfileError::NotRegularFile {
            path: path.display().to_string(),
        });
    }
    if metadata.permissions().mode() & 0o077 != 0 {
        return Err(KeyfileError::InsecurePermissions {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn read_exact_key<const N: usize>(path: &Path) -> Result<Zeroizing<[u8; N]>, KeyfileError> {
    check_protected(path)?;
    let metadata = fs::metadata(path)?;
    let got = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if got != N {
        return Err(KeyfileError::WrongLength {
            path: path.display().to_string(),
            expected: N,
            got,
        });
    }
    let mut buf = Zeroizing::new([0u8; N]);
    File::open(path)?.read_exact(&mut *buf)?;
    Ok(buf)
}

/// Loads a 64-byte Ed25519 signing keypair (seed ‖ public half).
///
/// # Errors
///
/// Fails if the file is not a regular file, is readable by group/other, is
/// not exactly 64 bytes, or if the public half does not match the seed.
pub fn read_signing_key(path: &Path) -> Result<SigningKey, KeyfileError> {
    let bytes = read_exact_key::<SIGNING_KEYPAIR_SIZE>(path)?;
    SigningKey::from_keypair_bytes(&bytes).map_err(|_| KeyfileError::MalformedKey {
        path: path.display().to_string(),
    })
}

/// Loads a 32-byte transport secret key.
///
/// # Errors
///
/// Fails if the file is not a regular file, is readable by group/other, or
/// is not exactly 32 bytes.
pub fn read_transport_key(path: &Path) -> Result<Zeroizing<[u8; TRANSPORT_KEY_SIZE]>, KeyfileError> {
    read_exact_key::<TRANSPORT_KEY_SIZE>(path)
}

//! The profile validity gate.
//!
//! Servers hold an unrefreshed binding for at most [`MAX_VALIDITY_PERIOD_SECS`]
//! before erasing it. A profile whose remaining lifetime has fallen below
//! half that window still verifies, since the data is real and may be
//! useful, but the gate flags it so callers can prompt the holder to
//! refresh.
//! This is the one place in the API where a verified value and an error
//! travel together; see `ClientError::OutOfDate` in the client crate.

use chrono::DateTime;
use thiserror::Error;

use crate::wire::Profile;

/// Maximum lifetime of an unrefreshed binding on a server, in seconds
/// (one year). Holders conventionally set expirations slightly below it.
pub const MAX_VALIDITY_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// A verified profile is close enough to expiry that it should be
/// refreshed. The message names the expiry instant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "the profile is out of date and will be erased completely on {}",
    format_instant(*expires_at)
)]
pub struct NearExpiry {
    /// Expiration as seconds since the Unix epoch.
    pub expires_at: u64,
}

fn format_instant(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(|| format!("unix time {secs}"), |t| t.to_rfc3339())
}

/// Applies the expiration-window policy to a verified profile.
///
/// A profile with no expiration at all is treated as already expiring:
/// servers will not retain it, so callers should not rely on it either.
///
/// # Errors
///
/// Returns [`NearExpiry`] unless
/// `expiration_time > now + MAX_VALIDITY_PERIOD/2`.
pub fn check_expiration(profile: &Profile, now_secs: u64) -> Result<(), NearExpiry> {
    let expires_at = profile.expiration_time.unwrap_or(0);
    if expires_at > now_secs.saturating_add(MAX_VALIDITY_PERIOD_SECS / 2) {
        Ok(())
    } else {
        Err(NearExpiry { expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn profile_expiring_at(expires_at: u64) -> Profile {
        Profile {
            expiration_time: Some(expires_at),
            ..Profile::default()
        }
    }

    #[test]
    fn full_lifetime_passes() {
        let profile = profile_expiring_at(NOW + MAX_VALIDITY_PERIOD_SECS - 100);
        assert_eq!(check_expiration(&profile, NOW), Ok(()));
    }

    #[test]
    fn quarter_lifetime_is_flagged() {
        let expires_at = NOW + MAX_VALIDITY_PERIOD_SECS / 4;
        let profile = profile_expiring_at(expires_at);
        assert_eq!(
            check_expiration(&profile, NOW),
            Err(NearExpiry { expires_at })
        );
    }

    #[test]
    fn boundary_is_strict() {
        let boundary = NOW + MAX_VALIDITY_PERIOD_SECS / 2;
        assert!(check_expiration(&profile_expiring_at(boundary), NOW).is_err());
        assert!(check_expiration(&profile_expiring_at(boundary + 1), NOW).is_ok());
    }

    #[test]
    fn missing_expiration_is_flagged() {
        assert_eq!(
            check_expiration(&Profile::default(), NOW),
            Err(NearExpiry { expires_at: 0 })
        );
    }

    #[test]
    fn message_names_the_expiry_instant() {
        let err = NearExpiry {
            expires_at: 1_700_000_000,
        };
        let message = err.to_string();
        assert!(message.contains("2023-11-14"), "message was: {message}");
    }
}

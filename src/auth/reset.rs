//! Single-use, time-limited password reset secrets.
//!
//! Only a SHA-256 digest of the secret is kept on the record. The secret carries
//! 160 bits of OS randomness, so a fast hash is enough here.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::repo_types::{PendingReset, User};

pub const SECRET_BYTES: usize = 20;

/// Plaintext reset secret, handed to the caller exactly once.
pub struct ResetSecret(String);

impl ResetSecret {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResetSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetSecret(..)")
    }
}

/// Hex SHA-256 of a presented secret, as stored on the record.
pub fn reset_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Start a reset, replacing any one already pending.
pub fn generate(user: &mut User, ttl: Duration, now: OffsetDateTime) -> ResetSecret {
    let mut raw = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut raw);
    let secret = hex::encode(raw);

    if user.reset.is_some() {
        debug!(user_id = %user.id, "replacing pending reset");
    }
    user.reset = Some(PendingReset {
        digest: reset_digest(&secret),
        expires_at: now + ttl,
    });
    debug!(user_id = %user.id, "reset token generated");
    ResetSecret(secret)
}

/// Redeem a presented secret. Clears the pending reset on success and on expiry;
/// a wrong secret leaves it in place.
pub fn consume(user: &mut User, presented: &str, now: OffsetDateTime) -> bool {
    let Some(pending) = user.reset.as_ref() else {
        debug!(user_id = %user.id, "no pending reset");
        return false;
    };

    if now > pending.expires_at {
        warn!(user_id = %user.id, "reset token expired");
        user.reset = None;
        return false;
    }

    let presented_digest = reset_digest(presented);
    let matches: bool = presented_digest
        .as_bytes()
        .ct_eq(pending.digest.as_bytes())
        .into();
    if !matches {
        warn!(user_id = %user.id, "reset token mismatch");
        return false;
    }

    user.reset = None;
    debug!(user_id = %user.id, "reset token consumed");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::sample_user;

    fn ttl() -> Duration {
        Duration::minutes(15)
    }

    #[test]
    fn secret_is_forty_hex_chars_and_only_digest_is_stored() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let secret = generate(&mut user, ttl(), now);

        assert_eq!(secret.as_str().len(), 40);
        assert!(secret.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let pending = user.reset.as_ref().expect("pending reset");
        assert_ne!(pending.digest, secret.as_str());
        assert_eq!(pending.digest.len(), 64);
        assert_eq!(pending.digest, reset_digest(secret.as_str()));
        assert_eq!(pending.expires_at, now + ttl());
    }

    #[test]
    fn consume_succeeds_exactly_once() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let secret = generate(&mut user, ttl(), now);

        assert!(consume(&mut user, secret.as_str(), now));
        assert!(user.reset.is_none());
        assert!(!consume(&mut user, secret.as_str(), now));
    }

    #[test]
    fn consume_after_ttl_fails_and_clears() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let secret = generate(&mut user, ttl(), now);

        let later = now + ttl() + Duration::seconds(1);
        assert!(!consume(&mut user, secret.as_str(), later));
        assert!(user.reset.is_none());
    }

    #[test]
    fn consume_at_exact_deadline_succeeds() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let secret = generate(&mut user, ttl(), now);
        assert!(consume(&mut user, secret.as_str(), now + ttl()));
    }

    #[test]
    fn wrong_secret_keeps_pending_reset() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let secret = generate(&mut user, ttl(), now);
        let before = user.reset.clone();

        assert!(!consume(&mut user, "0".repeat(40).as_str(), now));
        assert!(!consume(&mut user, "", now));
        assert_eq!(user.reset, before);

        let within = now + Duration::minutes(10);
        assert!(consume(&mut user, secret.as_str(), within));
    }

    #[test]
    fn regenerate_invalidates_previous_secret() {
        let mut user = sample_user();
        let now = OffsetDateTime::now_utc();
        let first = generate(&mut user, ttl(), now);
        let second = generate(&mut user, ttl(), now);

        assert_ne!(first.as_str(), second.as_str());
        assert!(!consume(&mut user, first.as_str(), now));
        assert!(consume(&mut user, second.as_str(), now));
    }

    #[test]
    fn consume_without_pending_reset_is_false() {
        let mut user = sample_user();
        assert!(!consume(&mut user, "abc123", OffsetDateTime::now_utc()));
        assert!(user.reset.is_none());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let mut user = sample_user();
        let secret = generate(&mut user, ttl(), OffsetDateTime::now_utc());
        assert_eq!(format!("{secret:?}"), "ResetSecret(..)");
    }
}

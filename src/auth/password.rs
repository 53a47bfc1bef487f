use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{debug, error, warn};

use crate::{
    auth::repo_types::{StoredPassword, User},
    config::PasswordConfig,
    error::AuthError,
};

pub const MIN_PASSWORD_LEN: usize = 8;

fn hasher(cfg: &PasswordConfig) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(cfg.memory_kib, cfg.time_cost, cfg.parallelism, None)
        .map_err(|e| {
            error!(error = %e, "invalid argon2 params");
            AuthError::Hashing(e.to_string())
        })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn ensure_min_length(plain: &str) -> Result<(), AuthError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a new plaintext with a fresh salt.
pub fn hash_password(plain: &str, cfg: &PasswordConfig) -> Result<StoredPassword, AuthError> {
    ensure_min_length(plain)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(cfg)?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AuthError::Hashing(e.to_string())
        })?
        .to_string();
    Ok(StoredPassword::new(hash))
}

/// Check a plaintext against a stored hash. Cost parameters are read from the hash itself.
pub fn verify_password(plain: &str, stored: &StoredPassword) -> bool {
    let parsed = match PasswordHash::new(stored.as_str()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Replace the record's hash when a new plaintext is supplied and differs from the current one.
///
/// Returns whether the hash was replaced.
pub fn rehash_if_changed(
    user: &mut User,
    new_plain: Option<&str>,
    cfg: &PasswordConfig,
) -> Result<bool, AuthError> {
    let Some(plain) = new_plain else {
        return Ok(false);
    };
    ensure_min_length(plain)?;
    if verify_password(plain, &user.password_hash) {
        debug!(user_id = %user.id, "password unchanged, keeping stored hash");
        return Ok(false);
    }
    user.password_hash = hash_password(plain, cfg)?;
    debug!(user_id = %user.id, "password re-hashed");
    Ok(true)
}

/// `hash_password` on the blocking pool.
pub async fn hash_password_blocking(
    plain: String,
    cfg: PasswordConfig,
) -> Result<StoredPassword, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&plain, &cfg))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// `verify_password` on the blocking pool. A panicked worker counts as a mismatch.
pub async fn verify_password_blocking(plain: String, stored: StoredPassword) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "verify_password task failed");
            false
        })
}

/// `rehash_if_changed` on the blocking pool.
pub async fn rehash_if_changed_blocking(
    mut user: User,
    new_plain: String,
    cfg: PasswordConfig,
) -> Result<(User, bool), AuthError> {
    tokio::task::spawn_blocking(move || {
        let changed = rehash_if_changed(&mut user, Some(&new_plain), &cfg)?;
        Ok::<_, AuthError>((user, changed))
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))?
}

#[cfg(test)]
pub(crate) fn test_config() -> PasswordConfig {
    PasswordConfig {
        time_cost: 1,
        memory_kib: 8,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::sample_user;

    #[test]
    fn hash_and_verify_roundtrip() {
        let cfg = test_config();
        let hash = hash_password("password123", &cfg).expect("hashing should succeed");
        assert_ne!(hash.as_str(), "password123");
        assert!(hash.as_str().len() >= 40);
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("wrongpass", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let cfg = test_config();
        let a = hash_password("correct-horse-battery-staple", &cfg).unwrap();
        let b = hash_password("correct-horse-battery-staple", &cfg).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("correct-horse-battery-staple", &a));
        assert!(verify_password("correct-horse-battery-staple", &b));
    }

    #[test]
    fn rejects_short_passwords() {
        let cfg = test_config();
        for short in ["", "1234567"] {
            let err = hash_password(short, &cfg).unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
        assert!(hash_password("12345678", &cfg).is_ok());
    }

    #[test]
    fn verify_is_false_on_malformed_hash() {
        let stored = StoredPassword::new("not-a-valid-hash".into());
        assert!(!verify_password("anything", &stored));
    }

    #[test]
    fn verify_uses_cost_embedded_in_hash() {
        let hash = hash_password("Secur3P@ssw0rd!", &test_config()).unwrap();
        assert!(hash.as_str().contains("m=8,t=1,p=1"));
        assert!(verify_password("Secur3P@ssw0rd!", &hash));
    }

    #[test]
    fn invalid_params_surface_as_hashing_error() {
        let cfg = PasswordConfig {
            time_cost: 0,
            memory_kib: 8,
            parallelism: 1,
        };
        assert!(matches!(
            hash_password("password123", &cfg),
            Err(AuthError::Hashing(_))
        ));
    }

    #[test]
    fn rehash_only_when_plaintext_changes() {
        let cfg = test_config();
        let mut user = sample_user();
        user.password_hash = hash_password("first-password", &cfg).unwrap();
        let original = user.password_hash.clone();

        assert!(!rehash_if_changed(&mut user, None, &cfg).unwrap());
        assert!(!rehash_if_changed(&mut user, Some("first-password"), &cfg).unwrap());
        assert_eq!(user.password_hash, original);

        assert!(rehash_if_changed(&mut user, Some("second-password"), &cfg).unwrap());
        assert_ne!(user.password_hash, original);
        assert!(verify_password("second-password", &user.password_hash));
    }

    #[test]
    fn rehash_validates_new_plaintext() {
        let cfg = test_config();
        let mut user = sample_user();
        let err = rehash_if_changed(&mut user, Some("short"), &cfg).unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn rehash_checks_length_before_comparing() {
        // a legacy 7-char hash: the short plaintext matches it but must still be refused
        let cfg = test_config();
        let salt = SaltString::generate(&mut OsRng);
        let legacy = hasher(&cfg)
            .unwrap()
            .hash_password(b"short12", &salt)
            .unwrap()
            .to_string();
        let mut user = sample_user();
        user.password_hash = StoredPassword::new(legacy);
        assert!(verify_password("short12", &user.password_hash));

        let err = rehash_if_changed(&mut user, Some("short12"), &cfg).unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn blocking_wrappers_roundtrip() {
        let hash = hash_password_blocking("password123".into(), test_config())
            .await
            .unwrap();
        assert!(verify_password_blocking("password123".into(), hash.clone()).await);
        assert!(!verify_password_blocking("wrongpass".into(), hash).await);
    }
}

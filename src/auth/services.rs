use lazy_static::lazy_static;
use regex::Regex;

use super::{
    password::hash_password_blocking,
    repo_types::{NewUser, Role},
};
use crate::{config::PasswordConfig, error::AuthError};

pub const FULL_NAME_MIN: usize = 5;
pub const FULL_NAME_MAX: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AuthError::validation("Invalid email"));
    }
    Ok(email)
}

pub fn normalize_full_name(raw: &str) -> Result<String, AuthError> {
    let name = raw.trim().to_lowercase();
    let len = name.chars().count();
    if len == 0 {
        return Err(AuthError::validation("Full name is required"));
    }
    if len < FULL_NAME_MIN {
        return Err(AuthError::validation(format!(
            "Full name must be at least {FULL_NAME_MIN} characters"
        )));
    }
    if len > FULL_NAME_MAX {
        return Err(AuthError::validation(format!(
            "Full name must be at most {FULL_NAME_MAX} characters"
        )));
    }
    Ok(name)
}

/// Normalize registration input and hash the password off the request thread.
pub async fn prepare_new_user(
    full_name: &str,
    email: &str,
    password: String,
    cfg: PasswordConfig,
) -> Result<NewUser, AuthError> {
    let full_name = normalize_full_name(full_name)?;
    let email = normalize_email(email)?;
    let password_hash = hash_password_blocking(password, cfg).await?;
    Ok(NewUser {
        full_name,
        email,
        password_hash,
        role: Role::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{test_config, verify_password};

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        for bad in ["", "   ", "no-at-sign", "a@b", "two words@example.com"] {
            assert!(
                matches!(normalize_email(bad), Err(AuthError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn full_name_bounds() {
        assert_eq!(normalize_full_name("  Ada Lovelace ").unwrap(), "ada lovelace");
        assert!(normalize_full_name("Ada").is_err());
        assert!(normalize_full_name("  abcd  ").is_err());
        assert!(normalize_full_name("abcde").is_ok());
        assert!(normalize_full_name(&"x".repeat(50)).is_ok());
        assert!(normalize_full_name(&"x".repeat(51)).is_err());
    }

    #[tokio::test]
    async fn prepare_new_user_hashes_and_defaults_role() {
        let new = prepare_new_user(
            "Grace Hopper",
            " Grace@Example.com",
            "password123".into(),
            test_config(),
        )
        .await
        .unwrap();
        assert_eq!(new.full_name, "grace hopper");
        assert_eq!(new.email, "grace@example.com");
        assert_eq!(new.role, Role::User);
        assert!(verify_password("password123", &new.password_hash));
    }

    #[tokio::test]
    async fn prepare_new_user_rejects_short_password() {
        let err = prepare_new_user("Grace Hopper", "grace@example.com", "short".into(), test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}

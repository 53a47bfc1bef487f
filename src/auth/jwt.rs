use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use super::{claims::Claims, repo_types::User};
use crate::{config::JwtConfig, error::AuthError, state::AppState};

/// Signing material and policy for session tokens.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user: &User, now: OffsetDateTime) -> Result<String, AuthError> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            role: user.role,
            email: user.email.clone(),
            subscription: user.subscription.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        debug!(user_id = %user.id, role = ?user.role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Signature, issuer and audience are checked by the decoder; expiry against `now`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError::InvalidToken
        })?;
        if data.claims.exp <= now.unix_timestamp() {
            warn!(user_id = %data.claims.sub, "jwt expired");
            return Err(AuthError::InvalidToken);
        }
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn test_keys(secret: &str) -> JwtKeys {
    JwtKeys::from_config(&JwtConfig {
        secret: secret.into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        ttl_minutes: 5,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{sample_user, Role};

    #[test]
    fn issue_and_verify_snapshot() {
        let keys = test_keys("dev-secret");
        let user = sample_user();
        let token = keys.issue(&user).expect("sign");
        assert_eq!(token.split('.').count(), 3);

        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.subscription, user.subscription);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn claims_are_a_snapshot() {
        let keys = test_keys("dev-secret");
        let mut user = sample_user();
        let token = keys.issue(&user).unwrap();
        user.role = Role::Admin;
        user.subscription = None;
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.role, Role::User);
        assert!(claims.subscription.is_some());
    }

    #[test]
    fn rejects_after_ttl() {
        let keys = test_keys("dev-secret");
        let now = OffsetDateTime::now_utc();
        let token = keys.issue_at(&sample_user(), now).unwrap();

        assert!(keys.verify_at(&token, now + TimeDuration::minutes(4)).is_ok());
        let err = keys
            .verify_at(&token, now + TimeDuration::minutes(5))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert!(keys
            .verify_at(&token, now + TimeDuration::hours(1))
            .is_err());
    }

    #[test]
    fn rejects_different_key() {
        let token = test_keys("key-one").issue(&sample_user()).unwrap();
        let err = test_keys("key-two").verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn rejects_wrong_issuer_or_audience() {
        let good = test_keys("same-secret");
        let mut bad = test_keys("same-secret");
        bad.issuer = "bad-iss".into();
        bad.audience = "bad-aud".into();
        let token = good.issue(&sample_user()).unwrap();
        assert!(matches!(bad.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_malformed_and_tampered_tokens() {
        let keys = test_keys("dev-secret");
        assert!(keys.verify("not-a-jwt").is_err());

        let mut admin = sample_user();
        admin.role = Role::Admin;
        let forged = keys.issue(&admin).unwrap();
        let forged_claims = forged.split('.').nth(1).unwrap();

        let token = keys.issue(&sample_user()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(matches!(keys.verify(&spliced), Err(AuthError::InvalidToken)));
    }
}

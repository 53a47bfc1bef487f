use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;

/// Role carried on the record and embedded in session tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AuthError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Media reference owned by the upload service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Avatar {
    pub public_id: String,
    pub secure_url: String,
}

/// Billing reference owned by the payments service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub status: String,
}

/// Outstanding password reset: digest of the issued secret plus its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub digest: String,
    pub expires_at: OffsetDateTime,
}

/// Argon2 PHC string. Only the password hasher and the row loader build one.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredPassword(String);

impl StoredPassword {
    pub(crate) fn new(phc: String) -> Self {
        Self(phc)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoredPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoredPassword(..)")
    }
}

/// Identity record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: StoredPassword, // never exposed in JSON
    pub role: Role,
    pub avatar: Option<Avatar>,
    pub subscription: Option<Subscription>,
    #[serde(skip_serializing)]
    pub reset: Option<PendingReset>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar_public_id: Option<String>,
    pub avatar_secure_url: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub reset_token_digest: Option<String>,
    pub reset_token_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let avatar = match (r.avatar_public_id, r.avatar_secure_url) {
            (Some(public_id), Some(secure_url)) => Some(Avatar {
                public_id,
                secure_url,
            }),
            _ => None,
        };
        let subscription = match (r.subscription_id, r.subscription_status) {
            (Some(id), Some(status)) => Some(Subscription { id, status }),
            _ => None,
        };
        // the table constraint keeps these paired; a half-set row means no pending reset
        let reset = match (r.reset_token_digest, r.reset_token_expiry) {
            (Some(digest), Some(expires_at)) => Some(PendingReset { digest, expires_at }),
            _ => None,
        };
        Ok(Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            password_hash: StoredPassword::new(r.password_hash),
            role: r.role.parse()?,
            avatar,
            subscription,
            reset,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields of a record about to be inserted.
#[derive(Debug)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: StoredPassword,
    pub role: Role,
}

#[cfg(test)]
pub(crate) fn sample_user() -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        full_name: "ada lovelace".into(),
        email: "ada@example.com".into(),
        password_hash: StoredPassword::new("$argon2id$placeholder".into()),
        role: Role::default(),
        avatar: None,
        subscription: Some(Subscription {
            id: "sub_123".into(),
            status: "active".into(),
        }),
        reset: None,
        created_at: now,
        updated_at: now,
    }
}

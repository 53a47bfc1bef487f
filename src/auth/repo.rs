use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PendingReset, StoredPassword, User, UserRow};

const USER_COLUMNS: &str = r#"
    id, full_name, email, password_hash, role,
    avatar_public_id, avatar_secure_url,
    subscription_id, subscription_status,
    reset_token_digest, reset_token_expiry,
    created_at, updated_at
"#;

fn into_user(row: Option<UserRow>) -> anyhow::Result<Option<User>> {
    row.map(User::try_from)
        .transpose()
        .context("decode user row")
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        into_user(row)
    }

    /// Find a user by ID.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        into_user(row)
    }

    /// Find the user holding a pending reset with this digest.
    pub async fn find_by_reset_digest(db: &PgPool, digest: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token_digest = $1"
        ))
        .bind(digest)
        .fetch_optional(db)
        .await
        .context("find user by reset digest")?;
        into_user(row)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, new: &NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (full_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(new.password_hash.as_str())
        .bind(new.role.as_str())
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(User::try_from(row)?)
    }

    /// Persist a new password hash and drop any pending reset.
    pub async fn update_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &StoredPassword,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   reset_token_digest = NULL,
                   reset_token_expiry = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash.as_str())
        .execute(db)
        .await
        .context("update password")?;
        Ok(())
    }

    /// Store the new hash and clear the reset, provided the reset with digest `expected`
    /// is still pending. Returns false if it was consumed or replaced meanwhile.
    pub async fn complete_reset(
        db: &PgPool,
        id: Uuid,
        expected: &str,
        password_hash: &StoredPassword,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3,
                   reset_token_digest = NULL,
                   reset_token_expiry = NULL,
                   updated_at = now()
             WHERE id = $1
               AND reset_token_digest = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(password_hash.as_str())
        .execute(db)
        .await
        .context("complete reset")?;
        Ok(result.rows_affected() == 1)
    }

    /// Write the reset state only if the stored digest still equals `expected`.
    ///
    /// Returns false when another writer got there first.
    pub async fn swap_reset_state(
        db: &PgPool,
        id: Uuid,
        expected: Option<&str>,
        next: Option<&PendingReset>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET reset_token_digest = $3,
                   reset_token_expiry = $4,
                   updated_at = now()
             WHERE id = $1
               AND reset_token_digest IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next.map(|p| p.digest.as_str()))
        .bind(next.map(|p| p.expires_at))
        .execute(db)
        .await
        .context("swap reset state")?;
        Ok(result.rows_affected() == 1)
    }
}

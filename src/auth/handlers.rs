use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
            MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{rehash_if_changed_blocking, verify_password_blocking},
        repo_types::User,
        reset,
        services::{normalize_email, prepare_new_user},
    },
    error::AuthError,
    notify::{reset_url, ResetNotifier},
    state::AppState,
};

type ApiError = (StatusCode, String);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
        .route("/auth/password/change", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn internal(e: anyhow::Error) -> ApiError {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
}

fn rejected(e: AuthError) -> ApiError {
    match e {
        AuthError::Validation(_) => warn!(error = %e, "request rejected"),
        _ => error!(error = %e, "credential operation failed"),
    }
    e.into()
}

fn invalid_credentials() -> ApiError {
    (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
}

fn invalid_reset() -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        "Invalid or expired reset token".into(),
    )
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email).map_err(rejected)?;

    // Ensure email is not taken
    match User::find_by_email(&state.db, &email).await {
        Ok(Some(_)) => {
            warn!(%email, "email already registered");
            return Err((StatusCode::CONFLICT, "Email already registered".into()));
        }
        Ok(None) => {}
        Err(e) => return Err(internal(e)),
    }

    let new = prepare_new_user(
        &payload.full_name,
        &email,
        payload.password,
        state.config.password,
    )
    .await
    .map_err(rejected)?;

    let user = match User::create(&state.db, &new).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(%email, "email registered concurrently");
            return Err((StatusCode::CONFLICT, "Email already registered".into()));
        }
        Err(e) => return Err(internal(e)),
    };

    let token = JwtKeys::from_ref(&state).issue(&user).map_err(rejected)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&payload.email).map_err(rejected)?;

    let user = match User::find_by_email(&state.db, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(invalid_credentials());
        }
        Err(e) => return Err(internal(e)),
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let token = JwtKeys::from_ref(&state).issue(&user).map_err(rejected)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(user)) => Ok(Json(user.into())),
        Ok(None) => {
            warn!(user_id = %claims.sub, "token for missing user");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
        Err(e) => Err(internal(e)),
    }
}

/// Always answers 202 so the endpoint cannot be used to probe for accounts.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let accepted = (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the account exists, a reset link has been sent".into(),
        }),
    );
    let email = normalize_email(&payload.email).map_err(rejected)?;

    let mut user = match User::find_by_email(&state.db, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            info!(%email, "reset requested for unknown email");
            return Ok(accepted);
        }
        Err(e) => return Err(internal(e)),
    };

    let prior = user.reset.as_ref().map(|p| p.digest.clone());
    let secret = reset::generate(&mut user, state.config.reset.ttl(), OffsetDateTime::now_utc());

    let stored = User::swap_reset_state(&state.db, user.id, prior.as_deref(), user.reset.as_ref())
        .await
        .map_err(internal)?;
    if !stored {
        warn!(user_id = %user.id, "concurrent reset request won; not notifying");
        return Ok(accepted);
    }

    let url = reset_url(&state.config.reset.url_base, secret.as_str());
    if !deliver_reset(state.notifier.as_ref(), &user.email, &url).await {
        // an undeliverable secret must not stay redeemable; the answer stays 202
        let digest = user.reset.as_ref().map(|p| p.digest.as_str());
        if let Err(e) = User::swap_reset_state(&state.db, user.id, digest, None).await {
            error!(error = %e, user_id = %user.id, "failed to clear reset after delivery error");
        }
        return Ok(accepted);
    }

    info!(user_id = %user.id, "reset token issued");
    Ok(accepted)
}

async fn deliver_reset(notifier: &dyn ResetNotifier, email: &str, url: &str) -> bool {
    match notifier.send_reset(email, url).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "deliver reset link failed");
            false
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let digest = reset::reset_digest(payload.token.trim());
    let mut user = match User::find_by_reset_digest(&state.db, &digest).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("reset with unknown token");
            return Err(invalid_reset());
        }
        Err(e) => return Err(internal(e)),
    };

    if !reset::consume(&mut user, payload.token.trim(), OffsetDateTime::now_utc()) {
        if user.reset.is_none() {
            // expired: drop it so it cannot linger
            if let Err(e) = User::swap_reset_state(&state.db, user.id, Some(&digest), None).await {
                error!(error = %e, user_id = %user.id, "failed to clear expired reset");
            }
        }
        return Err(invalid_reset());
    }

    let (user, _) = rehash_if_changed_blocking(user, payload.password, state.config.password)
        .await
        .map_err(rejected)?;

    let won = User::complete_reset(&state.db, user.id, &digest, &user.password_hash)
        .await
        .map_err(internal)?;
    if !won {
        warn!(user_id = %user.id, "reset token already used");
        return Err(invalid_reset());
    }

    let token = JwtKeys::from_ref(&state).issue(&user).map_err(rejected)?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, claims, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => return Err(internal(e)),
    };

    if !verify_password_blocking(payload.current_password, user.password_hash.clone()).await {
        warn!(user_id = %user.id, "change password with wrong current password");
        return Err(invalid_credentials());
    }

    let (user, changed) =
        rehash_if_changed_blocking(user, payload.new_password, state.config.password)
            .await
            .map_err(rejected)?;

    if changed {
        User::update_password(&state.db, user.id, &user.password_hash)
            .await
            .map_err(internal)?;
        info!(user_id = %user.id, "password changed");
    }

    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod state;

pub use auth::{
    claims::Claims,
    jwt::JwtKeys,
    password::{hash_password, rehash_if_changed, verify_password},
    repo_types::{Avatar, PendingReset, Role, StoredPassword, Subscription, User},
    reset::{consume, generate, reset_digest, ResetSecret},
};
pub use error::AuthError;

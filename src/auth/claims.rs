use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{Role, Subscription};

/// JWT payload: a snapshot of the record at issuance time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,                          // user ID
    pub role: Role,                         // role at issuance
    pub email: String,                      // email at issuance
    pub subscription: Option<Subscription>, // billing snapshot, may be stale until exp
    pub iat: i64,                           // issued at (unix timestamp)
    pub exp: i64,                           // expires at (unix timestamp)
    pub iss: String,                        // issuer
    pub aud: String,                        // audience
}

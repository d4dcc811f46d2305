use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatcoder_types::models::User;

/// Stored user row. Distinct from chatcoder-types `User` so the password
/// hash never reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: &str, password_hash: &str) -> Self {
        Self {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn public(&self) -> User {
        User {
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

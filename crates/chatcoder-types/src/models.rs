use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of a registered user. The password hash stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A chat message as persisted and as delivered to clients.
///
/// `id` is assigned by the message store, strictly increasing in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayEvent {
    /// Server confirms successful authentication and lists who is online,
    /// including the new connection's own user
    Ready {
        username: String,
        online_users: Vec<String>,
    },

    /// A message was accepted and persisted
    NewMessage(Message),

    /// A user came online (first open connection)
    UserJoined { username: String, message: String },

    /// A user went offline (last connection closed)
    UserLeft { username: String, message: String },

    /// Number of distinct users currently connected
    OnlineCount { count: usize },

    /// Delivered only to the connection whose command failed
    Error { message: String },
}

impl GatewayEvent {
    pub fn user_joined(username: &str) -> Self {
        Self::UserJoined {
            username: username.to_string(),
            message: format!("{} joined the chat", username),
        }
    }

    pub fn user_left(username: &str) -> Self {
        Self::UserLeft {
            username: username.to_string(),
            message: format!("{} left the chat", username),
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayCommand {
    /// Authenticate a socket that did not present a token at upgrade
    Identify { token: String },

    /// Post a chat message
    SendMessage { content: String },
}

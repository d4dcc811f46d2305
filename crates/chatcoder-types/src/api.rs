use serde::{Deserialize, Serialize};

use crate::models::User;

// -- Token claims --

/// Bearer token claims shared by chatcoder-api (REST middleware) and
/// chatcoder-gateway (WebSocket authentication).
///
/// `iat` and `exp` are unix seconds; `exp` is always `iat + ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

/// Body of both `/api/auth/register` and `/api/auth/login`.
///
/// `token` is the shared access token that admits a client to the chat,
/// not a bearer token.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
    #[serde(alias = "accessToken", default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub users: usize,
    pub messages: usize,
    pub online: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

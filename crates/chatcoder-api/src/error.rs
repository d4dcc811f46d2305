use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use chatcoder_db::StoreError;
use chatcoder_gateway::DispatchError;
use chatcoder_types::api::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Message content must not be empty")]
    EmptyContent,

    #[error("Username already taken")]
    DuplicateUser,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Token expired or invalid")]
    TokenExpiredOrInvalid,

    #[error("Internal server error")]
    PersistenceFailure,

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidAccessToken | Self::InvalidInput(_) | Self::EmptyContent => {
                StatusCode::BAD_REQUEST
            }
            Self::DuplicateUser => StatusCode::CONFLICT,
            Self::UserNotFound | Self::InvalidCredentials | Self::TokenExpiredOrInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAccessToken => "invalid_access_token",
            Self::InvalidInput(_) => "invalid_input",
            Self::EmptyContent => "empty_content",
            Self::DuplicateUser => "duplicate_user",
            Self::UserNotFound => "user_not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::TokenExpiredOrInvalid => "token_expired_or_invalid",
            Self::PersistenceFailure => "persistence_failure",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUser(_) => Self::DuplicateUser,
            other => {
                error!("Store error: {}", other);
                Self::PersistenceFailure
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Store(e) => e.into(),
            other => {
                error!("Dispatch error: {}", other);
                Self::PersistenceFailure
            }
        }
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::PersistenceFailure
    })?
}

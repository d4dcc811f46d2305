use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use chatcoder_db::{CredentialStore, MessageStore};

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.clone();
    let name = username.clone();
    let deleted = blocking(move || Ok(store.delete_user(&name)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    info!("Admin deleted user {}", username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.clone();
    let deleted = blocking(move || Ok(store.delete_message(id)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    info!("Admin deleted message {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    #[tokio::test]
    async fn delete_then_missing() {
        let state = memory_state();
        state.store.create_user("mallory", "hash").unwrap();
        let message = state.store.append("mallory", "spam").unwrap();

        let status = delete_user(State(state.clone()), Path("mallory".into())).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let again = delete_user(State(state.clone()), Path("mallory".into())).await;
        assert!(matches!(again, Err(ApiError::NotFound)));

        let status = delete_message(State(state.clone()), Path(message.id)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let again = delete_message(State(state.clone()), Path(message.id)).await;
        assert!(matches!(again, Err(ApiError::NotFound)));
    }
}

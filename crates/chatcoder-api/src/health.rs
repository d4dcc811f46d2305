use axum::{Json, extract::State};

use chatcoder_db::{CredentialStore, MessageStore};
use chatcoder_types::api::HealthResponse;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.store.clone();
    let (users, messages) =
        blocking(move || Ok((store.user_count()?, store.message_count()?))).await?;
    let online = state.dispatcher.online_count().await;

    Ok(Json(HealthResponse {
        status: "ok".into(),
        users,
        messages,
        online,
    }))
}

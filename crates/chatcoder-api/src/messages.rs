use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;

use chatcoder_db::MessageStore;
use chatcoder_types::api::{Claims, SendMessageRequest};
use chatcoder_types::models::Message;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<usize>,
    /// Only messages with a greater id; lets a poller fetch what it missed.
    pub after: Option<u64>,
}

impl MessageQuery {
    fn effective_limit(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let limit = query.effective_limit(state.history_limit);
    let store = state.store.clone();

    let messages = blocking(move || {
        let messages = match query.after {
            Some(after) => store.since(after, limit)?,
            None => store.recent(limit)?,
        };
        Ok(messages)
    })
    .await?;

    Ok(Json(messages))
}

/// Polling counterpart of the gateway's `send-message`. Goes through the
/// dispatcher so WebSocket clients receive it in the same order.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    if content.is_empty() {
        debug!("{} posted empty message", claims.username);
        return Err(ApiError::EmptyContent);
    }

    let message = state.dispatcher.publish(&claims.username, content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn claims(username: &str) -> Extension<Claims> {
        Extension(Claims {
            username: username.into(),
            iat: 0,
            exp: i64::MAX,
        })
    }

    #[test]
    fn limit_clamped() {
        let q = MessageQuery::default();
        assert_eq!(q.effective_limit(50), 50);
        let q = MessageQuery { limit: Some(0), after: None };
        assert_eq!(q.effective_limit(50), 1);
        let q = MessageQuery { limit: Some(10_000), after: None };
        assert_eq!(q.effective_limit(50), MAX_LIMIT);
    }

    #[tokio::test]
    async fn whitespace_post_rejected_and_store_unchanged() {
        let state = memory_state();
        let result = send_message(
            State(state.clone()),
            claims("alice"),
            Json(SendMessageRequest { content: "   \n\t".into() }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::EmptyContent)));
        assert_eq!(state.store.message_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn post_then_poll() {
        let state = memory_state();
        for text in ["one", " two ", "three"] {
            send_message(
                State(state.clone()),
                claims("alice"),
                Json(SendMessageRequest { content: text.into() }),
            )
            .await
            .unwrap();
        }

        let Json(all) = get_messages(State(state.clone()), Query(MessageQuery::default()))
            .await
            .unwrap();
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);

        let Json(newer) = get_messages(
            State(state.clone()),
            Query(MessageQuery { limit: None, after: Some(all[0].id) }),
        )
        .await
        .unwrap();
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].id, all[1].id);
    }
}

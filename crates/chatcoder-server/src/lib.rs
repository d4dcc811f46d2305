pub mod config;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chatcoder_api::middleware::{bearer_token, require_admin, require_auth};
use chatcoder_api::{AppState, AppStateInner, ApiError, SharedSecretGate};
use chatcoder_api::{admin, auth, health, messages};
use chatcoder_crypto::{TokenService, generate_secret};
use chatcoder_db::SharedStore;
use chatcoder_gateway::{Dispatcher, connection};

use crate::config::Config;

/// Open the store, spawn the dispatcher and wire up shared state.
/// Must be called inside a tokio runtime.
pub fn build_state(config: &Config) -> Result<AppState> {
    let store = chatcoder_db::open(&config.store)?;
    Ok(state_with_store(config, store))
}

/// Wire up shared state over an already opened store.
/// Must be called inside a tokio runtime.
pub fn state_with_store(config: &Config, store: SharedStore) -> AppState {
    let secret = match &config.jwt_secret {
        Some(secret) => secret.clone(),
        None => {
            warn!("CHATCODER_JWT_SECRET not set; using a random secret, tokens will not survive a restart");
            generate_secret()
        }
    };

    Arc::new(AppStateInner {
        store: store.clone(),
        tokens: TokenService::new(secret.as_bytes(), config.token_ttl),
        gate: Arc::new(SharedSecretGate::new(config.access_token.clone())),
        dispatcher: Dispatcher::spawn(store),
        history_limit: config.history_limit,
        admin_token: config.admin_token.clone(),
    })
}

pub fn router(state: AppState, config: &Config) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), require_auth);

    let read_messages = if config.public_read {
        get(messages::get_messages)
    } else {
        get(messages::get_messages).route_layer(auth_layer.clone())
    };
    let post_messages = post(messages::send_message).route_layer(auth_layer);

    let mut api: Router<AppState> = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/health", get(health::health))
        .route("/api/messages", read_messages.merge(post_messages))
        .route("/gateway", get(ws_upgrade));

    if state.admin_token.is_some() {
        let admin_routes: Router<AppState> = Router::new()
            .route("/api/admin/users/{username}", delete(admin::delete_user))
            .route("/api/admin/messages/{id}", delete(admin::delete_message))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));
        api = api.merge(admin_routes);
        info!("Admin routes enabled");
    }

    let mut app = api.with_state(state);

    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Build state and router in one step.
pub fn app(config: &Config) -> Result<Router> {
    let state = build_state(config)?;
    Ok(router(state, config))
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// A token at upgrade (`?token=` or bearer header) is verified before the
/// upgrade; without one the socket must identify itself after connecting.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let presented = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_string));

    let dispatcher = state.dispatcher.clone();
    match presented {
        Some(token) => match state.tokens.verify(&token) {
            Some(claims) => ws.on_upgrade(move |socket| {
                connection::handle_connection_authenticated(socket, dispatcher, claims.username)
            }),
            None => ApiError::TokenExpiredOrInvalid.into_response(),
        },
        None => {
            let tokens = state.tokens.clone();
            ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, tokens))
        }
    }
}

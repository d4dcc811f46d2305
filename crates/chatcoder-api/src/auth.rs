use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use chatcoder_crypto::{hash_password, verify_password};
use chatcoder_db::CredentialStore;
use chatcoder_types::api::{AuthResponse, CredentialsRequest};

use crate::error::{ApiError, blocking};
use crate::state::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ApiError::InvalidInput(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ApiError::InvalidInput(
            "Username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::InvalidInput(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    Ok(())
}

fn issue_token(state: &AppState, username: &str) -> Result<String, ApiError> {
    state.tokens.issue(username).map_err(|e| {
        error!("Failed to issue token for {}: {}", username, e);
        ApiError::PersistenceFailure
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.gate.admit(&req.token) {
        return Err(ApiError::InvalidAccessToken);
    }
    validate_username(&req.username)?;
    validate_password(&req.password)?;

    // Hash with Argon2id and insert off the async runtime
    let store = state.store.clone();
    let CredentialsRequest {
        username, password, ..
    } = req;
    let record = blocking(move || {
        let password_hash = hash_password(&password).map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::PersistenceFailure
        })?;
        Ok(store.create_user(&username, &password_hash)?)
    })
    .await?;

    let token = issue_token(&state, &record.username)?;
    info!("Registered {}", record.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".into(),
            user: record.public(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.gate.admit(&req.token) {
        return Err(ApiError::InvalidAccessToken);
    }

    let store = state.store.clone();
    let CredentialsRequest {
        username, password, ..
    } = req;
    let record = blocking(move || {
        let record = store
            .find_by_username(&username)?
            .ok_or(ApiError::UserNotFound)?;
        if !verify_password(&password, &record.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(record)
    })
    .await?;

    let token = issue_token(&state, &record.username)?;
    info!("{} logged in", record.username);

    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        user: record.public(),
        token,
    }))
}

#[cfg(test)]
mod tests {
    use axum::response::Response;

    use super::*;
    use crate::state::test_support::memory_state;

    fn creds(username: &str, password: &str, token: &str) -> Json<CredentialsRequest> {
        Json(CredentialsRequest {
            username: username.into(),
            password: password.into(),
            token: token.into(),
        })
    }

    fn status_of(result: Result<impl IntoResponse, ApiError>) -> StatusCode {
        match result {
            Ok(r) => r.into_response().status(),
            Err(e) => e.status(),
        }
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("a.b-c_d9").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("émile").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
    }

    #[tokio::test]
    async fn register_then_login() {
        let state = memory_state();

        let resp: Response = register(State(state.clone()), creds("alice", "password1", "chat-all-us1"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = login(State(state.clone()), creds("alice", "password1", "chat-all-us1"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // Stored hash is a PHC string, never the plaintext.
        let record = state.store.find_by_username("alice").unwrap().unwrap();
        assert!(record.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn register_error_codes() {
        let state = memory_state();

        let bad_gate = register(State(state.clone()), creds("alice", "password1", "nope")).await;
        assert_eq!(status_of(bad_gate), StatusCode::BAD_REQUEST);

        let short = register(State(state.clone()), creds("al", "password1", "chat-all-us1")).await;
        assert!(matches!(short, Err(ApiError::InvalidInput(_))));

        register(State(state.clone()), creds("alice", "password1", "chat-all-us1"))
            .await
            .unwrap();
        let dup = register(State(state.clone()), creds("alice", "password2", "chat-all-us1")).await;
        assert!(matches!(dup, Err(ApiError::DuplicateUser)));
        assert_eq!(state.store.user_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn login_error_codes() {
        let state = memory_state();
        register(State(state.clone()), creds("alice", "password1", "chat-all-us1"))
            .await
            .unwrap();

        let bad_gate = login(State(state.clone()), creds("alice", "password1", "")).await;
        assert!(matches!(bad_gate, Err(ApiError::InvalidAccessToken)));

        let missing = login(State(state.clone()), creds("bob", "password1", "chat-all-us1")).await;
        assert!(matches!(missing, Err(ApiError::UserNotFound)));

        let wrong = login(State(state.clone()), creds("alice", "password2", "chat-all-us1")).await;
        assert!(matches!(wrong, Err(ApiError::InvalidCredentials)));
    }
}

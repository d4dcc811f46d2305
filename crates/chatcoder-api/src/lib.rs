pub mod admin;
pub mod admission;
pub mod auth;
pub mod error;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod state;

pub use admission::{AdmissionGate, DEFAULT_ACCESS_TOKEN, SharedSecretGate};
pub use error::ApiError;
pub use state::{AppState, AppStateInner};

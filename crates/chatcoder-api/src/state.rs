use std::sync::Arc;

use chatcoder_crypto::TokenService;
use chatcoder_db::SharedStore;
use chatcoder_gateway::Dispatcher;

use crate::admission::AdmissionGate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: SharedStore,
    pub tokens: TokenService,
    pub gate: Arc<dyn AdmissionGate>,
    pub dispatcher: Dispatcher,
    /// Default page size for `GET /api/messages`.
    pub history_limit: usize,
    /// Admin routes are mounted only when this is set.
    pub admin_token: Option<String>,
}

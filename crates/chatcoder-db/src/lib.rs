pub mod json_file;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod ring;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use chatcoder_types::models::Message;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use models::UserRecord;
pub use sqlite::SqliteStore;

/// Retention bound used when none is configured.
pub const DEFAULT_RETENTION: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken: {0}")]
    DuplicateUser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Owner of user records.
pub trait CredentialStore: Send + Sync {
    /// Atomic create-or-fail: exactly one of several concurrent creates for the
    /// same username succeeds, the rest get `DuplicateUser`.
    fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError>;

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Admin operation. Returns false when the user did not exist.
    fn delete_user(&self, username: &str) -> Result<bool, StoreError>;

    fn user_count(&self) -> Result<usize, StoreError>;
}

/// Append-only message log with a bounded retention window.
pub trait MessageStore: Send + Sync {
    /// Assigns id and timestamp, appends, and evicts the oldest messages
    /// while the log exceeds the retention bound. Content is not validated here.
    fn append(&self, author: &str, content: &str) -> Result<Message, StoreError>;

    /// At most `limit` most recent messages, oldest first.
    fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Messages with `id > after_id`, oldest first, at most `limit` of them.
    fn since(&self, after_id: u64, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Admin operation. Returns false when the message was not retained.
    fn delete_message(&self, id: u64) -> Result<bool, StoreError>;

    fn message_count(&self) -> Result<usize, StoreError>;
}

/// Combined storage capability handed to the API and the gateway.
pub trait Store: CredentialStore + MessageStore {}

impl<T: CredentialStore + MessageStore> Store for T {}

pub type SharedStore = Arc<dyn Store>;

/// Which backend to open at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Json { dir: PathBuf },
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub retention: usize,
}

/// Open the configured backend.
pub fn open(config: &StoreConfig) -> Result<SharedStore> {
    let retention = config.retention.max(1);
    let store: SharedStore = match &config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(retention)),
        StoreBackend::Json { dir } => Arc::new(JsonFileStore::open(dir, retention)?),
        StoreBackend::Sqlite { path } => Arc::new(SqliteStore::open(path, retention)?),
    };
    info!("Store ready ({:?}, retention {})", config.backend, retention);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_memory_backend() {
        let store = open(&StoreConfig {
            backend: StoreBackend::Memory,
            retention: 0,
        })
        .unwrap();

        // A zero bound is raised to one so the newest message is always kept.
        store.append("a", "1").unwrap();
        store.append("a", "2").unwrap();
        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "2");
    }

    #[test]
    fn open_json_backend_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let store = open(&StoreConfig {
            backend: StoreBackend::Json { dir: dir.clone() },
            retention: DEFAULT_RETENTION,
        })
        .unwrap();
        store.create_user("alice", "hash").unwrap();
        assert!(dir.join("users.json").exists());
    }
}

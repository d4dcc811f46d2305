use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use chatcoder_types::models::Message;

use crate::ring::MessageRing;
use crate::{CredentialStore, MessageStore, StoreError, UserRecord};

const USERS_FILE: &str = "users.json";
const MESSAGES_FILE: &str = "messages.json";

struct State {
    users: HashMap<String, UserRecord>,
    messages: MessageRing,
}

/// Two JSON array files under a data directory.
///
/// Both files are loaded once at open and rewritten after every mutation while
/// the store mutex is held. A mutation is applied to a copy, and the copy
/// replaces the live state only once it has been written, so a failed write
/// leaves memory matching disk.
pub struct JsonFileStore {
    dir: PathBuf,
    state: Mutex<State>,
}

impl JsonFileStore {
    pub fn open(dir: &Path, retention: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;

        let users: Vec<UserRecord> = read_array(&dir.join(USERS_FILE))?;
        let messages: Vec<Message> = read_array(&dir.join(MESSAGES_FILE))?;

        let mut by_name = HashMap::with_capacity(users.len());
        for user in users {
            if by_name.contains_key(&user.username) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate username in {}: {}",
                    USERS_FILE, user.username
                )));
            }
            by_name.insert(user.username.clone(), user);
        }

        info!(
            "JSON store opened at {} ({} users, {} messages)",
            dir.display(),
            by_name.len(),
            messages.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            state: Mutex::new(State {
                users: by_name,
                messages: MessageRing::from_messages(messages, retention),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    fn save_users(&self, users: &HashMap<String, UserRecord>) -> Result<(), StoreError> {
        let mut users: Vec<&UserRecord> = users.values().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        write_atomic(&self.dir.join(USERS_FILE), &users)
    }

    fn save_messages(&self, messages: &MessageRing) -> Result<(), StoreError> {
        let messages: Vec<&Message> = messages.iter().collect();
        write_atomic(&self.dir.join(MESSAGES_FILE), &messages)
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} missing, starting empty", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write to a sibling temp file then rename over the target.
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CredentialStore for JsonFileStore {
    fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let mut state = self.lock()?;
        let mut users = state.users.clone();
        let record = match users.entry(username.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateUser(username.to_string())),
            Entry::Vacant(slot) => slot.insert(UserRecord::new(username, password_hash)).clone(),
        };
        self.save_users(&users)?;
        state.users = users;
        Ok(record)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.lock()?.users.get(username).cloned())
    }

    fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(username) {
            return Ok(false);
        }
        let mut users = state.users.clone();
        users.remove(username);
        self.save_users(&users)?;
        state.users = users;
        Ok(true)
    }

    fn user_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.users.len())
    }
}

impl MessageStore for JsonFileStore {
    fn append(&self, author: &str, content: &str) -> Result<Message, StoreError> {
        let mut state = self.lock()?;
        let mut messages = state.messages.clone();
        let message = messages.push(author, content);
        self.save_messages(&messages)?;
        state.messages = messages;
        Ok(message)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        Ok(self.lock()?.messages.recent(limit))
    }

    fn since(&self, after_id: u64, limit: usize) -> Result<Vec<Message>, StoreError> {
        Ok(self.lock()?.messages.since(after_id, limit))
    }

    fn delete_message(&self, id: u64) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let mut messages = state.messages.clone();
        if !messages.remove(id) {
            return Ok(false);
        }
        self.save_messages(&messages)?;
        state.messages = messages;
        Ok(true)
    }

    fn message_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.messages.len())
    }
}

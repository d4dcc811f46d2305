use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use chatcoder_types::models::Message;

use crate::ring::MessageRing;
use crate::{CredentialStore, MessageStore, StoreError, UserRecord};

/// Process-local store. Everything is lost on restart.
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    messages: Mutex<MessageRing>,
}

impl MemoryStore {
    pub fn new(retention: usize) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            messages: Mutex::new(MessageRing::new(retention)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        match users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateUser(username.to_string())),
            Entry::Vacant(slot) => Ok(slot.insert(UserRecord::new(username, password_hash)).clone()),
        }
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.get(username).cloned())
    }

    fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.remove(username).is_some())
    }

    fn user_count(&self) -> Result<usize, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.len())
    }
}

impl MessageStore for MemoryStore {
    fn append(&self, author: &str, content: &str) -> Result<Message, StoreError> {
        let mut ring = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ring.push(author, content))
    }

    fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let ring = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ring.recent(limit))
    }

    fn since(&self, after_id: u64, limit: usize) -> Result<Vec<Message>, StoreError> {
        let ring = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ring.since(after_id, limit))
    }

    fn delete_message(&self, id: u64) -> Result<bool, StoreError> {
        let mut ring = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ring.remove(id))
    }

    fn message_count(&self) -> Result<usize, StoreError> {
        let ring = self.messages.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ring.len())
    }
}

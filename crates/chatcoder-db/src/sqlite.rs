use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::info;

use chatcoder_types::models::Message;

use crate::{CredentialStore, MessageStore, StoreError, UserRecord, migrations};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    retention: usize,
}

impl SqliteStore {
    pub fn open(path: &Path, retention: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            retention: retention.max(1),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

type MessageRow = (i64, String, String, String);

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}

fn to_message((id, author, content, timestamp): MessageRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("negative id {}", id)))?,
        author,
        content,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

impl CredentialStore for SqliteStore {
    fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let record = UserRecord::new(username, password_hash);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
            params![record.username, record.password_hash, record.created_at.to_rfc3339()],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateUser(username.to_string())
            } else {
                e.into()
            }
        })?;
        Ok(record)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT username, password, created_at FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;

        row.map(|(username, password_hash, created_at)| {
            Ok(UserRecord {
                username,
                password_hash,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        Ok(n > 0)
    }

    fn user_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl MessageStore for SqliteStore {
    fn append(&self, author: &str, content: &str) -> Result<Message, StoreError> {
        let timestamp = Utc::now();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO messages (author, content, timestamp) VALUES (?1, ?2, ?3)",
            params![author, content, timestamp.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "DELETE FROM messages WHERE id NOT IN
                (SELECT id FROM messages ORDER BY id DESC LIMIT ?1)",
            params![clamp_limit(self.retention)],
        )?;
        tx.commit()?;

        to_message((id, author.to_string(), content.to_string(), timestamp.to_rfc3339()))
    }

    fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, author, content, timestamp FROM
                (SELECT id, author, content, timestamp FROM messages ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![clamp_limit(limit)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<MessageRow>, _>>()?;
        rows.into_iter().map(to_message).collect()
    }

    fn since(&self, after_id: u64, limit: usize) -> Result<Vec<Message>, StoreError> {
        let after = i64::try_from(after_id).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, author, content, timestamp FROM messages
             WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after, clamp_limit(limit)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<MessageRow>, _>>()?;
        rows.into_iter().map(to_message).collect()
    }

    fn delete_message(&self, id: u64) -> Result<bool, StoreError> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(false);
        };
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn message_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

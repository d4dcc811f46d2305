use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Online users and their open connections.
///
/// A user is online while at least one connection is registered. Owned by
/// the dispatcher task, so it needs no locking.
#[derive(Debug, Default)]
pub struct Presence {
    online: HashMap<String, HashSet<Uuid>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this made the user go online.
    pub fn join(&mut self, username: &str, conn_id: Uuid) -> bool {
        let conns = self.online.entry(username.to_string()).or_default();
        let was_offline = conns.is_empty();
        conns.insert(conn_id) && was_offline
    }

    /// Returns true when this closed the user's last connection.
    pub fn leave(&mut self, username: &str, conn_id: Uuid) -> bool {
        let Some(conns) = self.online.get_mut(username) else {
            return false;
        };
        if !conns.remove(&conn_id) {
            return false;
        }
        if conns.is_empty() {
            self.online.remove(username);
            return true;
        }
        false
    }

    pub fn count(&self) -> usize {
        self.online.len()
    }

    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.online.keys().cloned().collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_leave_transitions() {
        let mut presence = Presence::new();
        let c1 = Uuid::new_v4();

        assert!(presence.join("alice", c1));
        assert_eq!(presence.count(), 1);
        assert!(presence.leave("alice", c1));
        assert_eq!(presence.count(), 0);
    }

    #[test]
    fn double_join_and_leave_are_noops() {
        let mut presence = Presence::new();
        let c1 = Uuid::new_v4();

        assert!(presence.join("alice", c1));
        assert!(!presence.join("alice", c1));
        assert_eq!(presence.count(), 1);

        assert!(presence.leave("alice", c1));
        assert!(!presence.leave("alice", c1));
        assert!(!presence.leave("nobody", c1));
        assert_eq!(presence.count(), 0);
    }

    #[test]
    fn two_tabs_count_once() {
        let mut presence = Presence::new();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(presence.join("alice", c1));
        assert!(!presence.join("alice", c2));
        assert_eq!(presence.count(), 1);

        assert!(!presence.leave("alice", c1));
        assert_eq!(presence.online_users(), ["alice"]);
        assert!(presence.leave("alice", c2));
        assert!(presence.online_users().is_empty());
    }

    #[test]
    fn online_users_sorted() {
        let mut presence = Presence::new();
        presence.join("carol", Uuid::new_v4());
        presence.join("alice", Uuid::new_v4());
        presence.join("bob", Uuid::new_v4());
        assert_eq!(presence.online_users(), ["alice", "bob", "carol"]);
    }
}

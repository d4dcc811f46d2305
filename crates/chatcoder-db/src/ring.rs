use std::collections::VecDeque;

use chrono::Utc;

use chatcoder_types::models::Message;

/// Bounded message log shared by the in-process backends.
///
/// Insertion order is retention order; ids keep increasing after eviction.
#[derive(Debug, Clone)]
pub struct MessageRing {
    messages: VecDeque<Message>,
    capacity: usize,
    next_id: u64,
}

impl MessageRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Rebuild from persisted messages, keeping only the newest `capacity`.
    pub fn from_messages(messages: Vec<Message>, capacity: usize) -> Self {
        let mut ring = Self::new(capacity);
        ring.next_id = messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        ring.messages = messages.into();
        ring.evict();
        ring
    }

    pub fn push(&mut self, author: &str, content: &str) -> Message {
        let message = Message {
            id: self.next_id,
            author: author.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push_back(message.clone());
        self.evict();
        message
    }

    pub fn recent(&self, limit: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn since(&self, after_id: u64, limit: usize) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.id > after_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn remove(&mut self, id: u64) -> bool {
        match self.messages.iter().position(|m| m.id == id) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    fn evict(&mut self) {
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_in_order() {
        let mut ring = MessageRing::new(3);
        for i in 1..=5 {
            ring.push("a", &format!("m{}", i));
        }
        let contents: Vec<_> = ring.recent(3).into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["m3", "m4", "m5"]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn recent_caps_at_limit() {
        let mut ring = MessageRing::new(10);
        for i in 1..=4 {
            ring.push("a", &format!("m{}", i));
        }
        let ids: Vec<_> = ring.recent(2).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, [3, 4]);
        assert_eq!(ring.recent(0).len(), 0);
        assert_eq!(ring.recent(100).len(), 4);
    }

    #[test]
    fn since_pages_forward() {
        let mut ring = MessageRing::new(10);
        for i in 1..=5 {
            ring.push("a", &format!("m{}", i));
        }
        let ids: Vec<_> = ring.since(1, 2).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, [2, 3]);
        let ids: Vec<_> = ring.since(3, 10).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, [4, 5]);
        assert!(ring.since(5, 10).is_empty());
    }

    #[test]
    fn ids_survive_reload_and_eviction() {
        let mut ring = MessageRing::new(2);
        ring.push("a", "1");
        ring.push("a", "2");
        ring.push("a", "3");
        let persisted: Vec<Message> = ring.iter().cloned().collect();

        let mut reloaded = MessageRing::from_messages(persisted, 2);
        let next = reloaded.push("a", "4");
        assert_eq!(next.id, 4);
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn remove_by_id() {
        let mut ring = MessageRing::new(5);
        let m = ring.push("a", "x");
        assert!(ring.remove(m.id));
        assert!(!ring.remove(m.id));
        assert!(ring.is_empty());
    }
}

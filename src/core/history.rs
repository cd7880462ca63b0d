// ChatSleuth - core/history.rs
//
// Bounded, ordered, thread-safe store of the most recent chat events.
//
// Insertion order is arrival order. At capacity, each append evicts exactly
// the single oldest entry first (strict FIFO). Readers take a snapshot copy,
// so a presentation refresh never observes a half-applied append.

use crate::core::model::ChatEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    events: Mutex<VecDeque<ChatEvent>>,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` events.
    ///
    /// A zero capacity is raised to 1: a history that can never hold an
    /// event would silently swallow System diagnostics.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one event, evicting the oldest when full.
    pub fn append(&self, event: ChatEvent) {
        let mut events = self.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Current contents in arrival order.
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take the lock, recovering from poisoning. Every mutation is a single
    /// push/pop, so a panicking holder cannot leave the deque inconsistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ChatEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Category;
    use std::sync::Arc;

    fn numbered(n: usize) -> ChatEvent {
        ChatEvent::chat(
            Category::Local,
            Some(String::new()),
            Some("Speaker".to_string()),
            format!("message {n}"),
            None,
        )
    }

    #[test]
    fn test_append_past_capacity_evicts_oldest() {
        let history = HistoryBuffer::new(3);
        for n in 0..4 {
            history.append(numbered(n));
        }
        let contents: Vec<String> = history
            .snapshot()
            .iter()
            .map(|e| e.content().to_string())
            .collect();
        assert_eq!(contents, vec!["message 1", "message 2", "message 3"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let history = HistoryBuffer::new(5);
        history.append(numbered(0));
        history.append(numbered(1));
        assert_eq!(history.snapshot(), history.snapshot());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let history = HistoryBuffer::new(0);
        assert_eq!(history.capacity(), 1);
        history.append(numbered(0));
        history.append(numbered(1));
        assert_eq!(history.snapshot(), vec![numbered(1)]);
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let history = Arc::new(HistoryBuffer::new(50));
        let writer = {
            let history = Arc::clone(&history);
            std::thread::spawn(move || {
                for n in 0..500 {
                    history.append(numbered(n));
                }
            })
        };
        for _ in 0..100 {
            let snap = history.snapshot();
            assert!(snap.len() <= 50);
            // Whatever window we observe must be contiguous and ascending.
            let numbers: Vec<usize> = snap
                .iter()
                .map(|e| e.content()["message ".len()..].parse().unwrap())
                .collect();
            assert!(numbers.windows(2).all(|w| w[1] == w[0] + 1));
        }
        writer.join().unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history.snapshot()[0], numbered(450));
    }
}

//! Min-heap of per-connection due times with lazy invalidation.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Utc};

use notifyhub_core::types::ConnectionId;

/// Queue of `(due, connection)` entries.
///
/// Rescheduling a connection pushes a new heap entry and records the
/// authoritative due time in a side map; heap entries that no longer
/// match the map are discarded when popped.
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, ConnectionId)>>,
    due: HashMap<ConnectionId, DateTime<Utc>>,
}

impl DeadlineQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule (or reschedule) `id` at `at`.
    pub fn schedule(&mut self, id: ConnectionId, at: DateTime<Utc>) {
        if self.due.get(&id) == Some(&at) {
            return;
        }
        self.due.insert(id, at);
        self.heap.push(Reverse((at, id)));
        self.compact();
    }

    /// Forget `id`.
    pub fn cancel(&mut self, id: &ConnectionId) {
        self.due.remove(id);
    }

    /// When `id` is due, if scheduled.
    pub fn due_at(&self, id: &ConnectionId) -> Option<DateTime<Utc>> {
        self.due.get(id).copied()
    }

    /// Remove and return every connection due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<ConnectionId> {
        let mut out = Vec::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            if self.due.get(&id) == Some(&at) {
                self.due.remove(&id);
                out.push(id);
            }
        }
        out
    }

    /// Number of scheduled connections.
    pub fn len(&self) -> usize {
        self.due.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.due.clear();
    }

    fn compact(&mut self) {
        if self.heap.len() > self.due.len() * 2 + 64 {
            self.heap = self
                .due
                .iter()
                .map(|(id, at)| Reverse((*at, *id)))
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_pops_in_due_order() {
        let now = Utc::now();
        let mut q = DeadlineQueue::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();
        q.schedule(a, now + Duration::seconds(5));
        q.schedule(b, now - Duration::seconds(1));
        q.schedule(c, now);

        assert_eq!(q.pop_due(now), vec![b, c]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(now + Duration::seconds(10)), vec![a]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_reschedule_invalidates_old_entry() {
        let now = Utc::now();
        let mut q = DeadlineQueue::new();
        let a = ConnectionId::new();
        q.schedule(a, now - Duration::seconds(1));
        q.schedule(a, now + Duration::seconds(30));

        assert!(q.pop_due(now).is_empty());
        assert_eq!(q.due_at(&a), Some(now + Duration::seconds(30)));
        assert_eq!(q.pop_due(now + Duration::seconds(30)), vec![a]);
    }

    #[test]
    fn test_cancel() {
        let now = Utc::now();
        let mut q = DeadlineQueue::new();
        let a = ConnectionId::new();
        q.schedule(a, now);
        q.cancel(&a);
        assert!(q.pop_due(now).is_empty());
    }

    #[test]
    fn test_compaction_keeps_live_entries() {
        let now = Utc::now();
        let mut q = DeadlineQueue::new();
        let a = ConnectionId::new();
        for i in 0..500 {
            q.schedule(a, now + Duration::seconds(i));
        }
        assert!(q.heap.len() <= 2 + 64);
        assert_eq!(q.pop_due(now + Duration::seconds(1000)), vec![a]);
    }
}

//! Local mirror of the user's most recent notifications.

use std::collections::HashSet;

use notifyhub_core::types::NotificationId;
use notifyhub_entity::Notification;

/// Most recent notifications (newest first) plus the unread count.
///
/// The hub may push a notification more than once; merging by id keeps
/// the cache free of duplicates.
#[derive(Debug, Clone)]
pub struct NotificationCache {
    items: Vec<Notification>,
    unread_count: i64,
    limit: usize,
    alerted: HashSet<NotificationId>,
}

impl NotificationCache {
    /// Empty cache holding at most `limit` notifications.
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            unread_count: 0,
            limit,
            alerted: HashSet::new(),
        }
    }

    /// Cached notifications, newest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.items
    }

    /// Last unread count reported by the hub.
    pub fn unread_count(&self) -> i64 {
        self.unread_count
    }

    /// Look up a cached notification.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == *id)
    }

    /// Number of cached notifications.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace everything with an `initial_notifications` snapshot.
    pub fn replace(&mut self, notifications: Vec<Notification>, unread_count: i64) {
        self.items = notifications;
        sort_newest_first(&mut self.items);
        self.unread_count = unread_count;
        self.trim();
    }

    /// Merge a `new_notifications` batch; returns the entries not seen before.
    pub fn merge(&mut self, notifications: Vec<Notification>) -> Vec<Notification> {
        let mut fresh = Vec::new();
        for incoming in notifications {
            match self.items.iter_mut().find(|n| n.id == incoming.id) {
                Some(existing) => {
                    // A read flag is never cleared by a stale redelivery.
                    let was_read = existing.is_read;
                    *existing = incoming;
                    existing.is_read |= was_read;
                }
                None => {
                    fresh.push(incoming.clone());
                    self.items.push(incoming);
                }
            }
        }
        sort_newest_first(&mut self.items);
        self.trim();
        fresh
    }

    /// Keep the entries of a `priority_notifications` batch not yet alerted.
    pub fn take_unalerted(&mut self, notifications: Vec<Notification>) -> Vec<Notification> {
        self.prune_alerted();
        notifications
            .into_iter()
            .filter(|n| self.alerted.insert(n.id))
            .collect()
    }

    /// Record a fresh unread count.
    pub fn set_unread_count(&mut self, unread_count: i64) {
        self.unread_count = unread_count;
    }

    /// Flip one cached entry to read; returns whether it was cached.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| n.id == *id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    /// Flip every cached entry to read and zero the count.
    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.is_read = true;
        }
        self.unread_count = 0;
    }

    fn trim(&mut self) {
        self.items.truncate(self.limit);
        self.prune_alerted();
    }

    /// Forget alerts for entries that fell out of the cache.
    fn prune_alerted(&mut self) {
        if self.alerted.len() > self.limit.max(1) * 2 {
            let live: HashSet<_> = self.items.iter().map(|n| n.id).collect();
            self.alerted.retain(|id| live.contains(id));
        }
    }
}

fn sort_newest_first(items: &mut [Notification]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

//! Registry of cell writes that are in flight.
//!
//! A debounced write for an address that already has a write in flight is
//! not sent; it is queued here and sent when the in-flight write resolves, so
//! at most one debounced write per address is outstanding and the last value
//! always reaches the server.

use crate::keys::CellKey;
use crate::model::CellUpdate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Most recently sent payload.
    pub latest: CellUpdate,
    /// Sent writes that have not resolved yet.
    pub in_flight: usize,
    /// Value waiting for the in-flight writes to resolve.
    pub queued: Option<String>,
    /// The cell was edited locally after `latest` was sent.
    pub edited: bool,
}

/// What to do after a write for an address resolves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteCompletion {
    /// Value to send now that the address is free.
    pub send_next: Option<String>,
    /// True if the address was edited, sent or queued again after the
    /// resolved write.
    pub superseded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    entries: HashMap<CellKey, PendingWrite>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `update` has been sent.
    pub fn begin(&mut self, update: &CellUpdate) {
        let key = CellKey::new(update.row_id.as_str(), update.column_id.as_str());
        let entry = self.entries.entry(key).or_insert_with(|| PendingWrite {
            latest: update.clone(),
            in_flight: 0,
            queued: None,
            edited: false,
        });
        entry.latest = update.clone();
        entry.in_flight += 1;
        entry.queued = None;
        entry.edited = false;
    }

    /// Notes a local edit to an address with a write in flight. The edit may
    /// still be waiting in the debouncer, so it is neither sent nor queued.
    pub fn mark_edited(&mut self, key: &CellKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.in_flight > 0 {
                entry.edited = true;
            }
        }
    }

    pub fn is_in_flight(&self, key: &CellKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.in_flight > 0)
    }

    /// Parks a value until the address is free. Returns false if nothing is
    /// in flight for `key`, in which case the caller should send directly.
    pub fn queue(&mut self, key: &CellKey, value: String) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.in_flight > 0 => {
                entry.queued = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Records that one write for the address of `update` resolved.
    pub fn complete(&mut self, update: &CellUpdate) -> WriteCompletion {
        let key = CellKey::new(update.row_id.as_str(), update.column_id.as_str());
        let Some(entry) = self.entries.get_mut(&key) else {
            return WriteCompletion::default();
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        let superseded =
            entry.in_flight > 0 || entry.queued.is_some() || entry.edited || entry.latest.value != update.value;

        if entry.in_flight > 0 {
            return WriteCompletion { send_next: None, superseded };
        }
        let send_next = entry.queued.take();
        self.entries.remove(&key);
        WriteCompletion { send_next, superseded }
    }

    pub fn get(&self, key: &CellKey) -> Option<&PendingWrite> {
        self.entries.get(key)
    }

    /// Drops queued values for a row that was deleted.
    pub fn forget_row(&mut self, row_id: &str) {
        for (key, entry) in self.entries.iter_mut() {
            if key.row_id == row_id {
                entry.queued = None;
            }
        }
    }

    /// Drops queued values for a column that was deleted.
    pub fn forget_column(&mut self, column_id: &str) {
        for (key, entry) in self.entries.iter_mut() {
            if key.column_id == column_id {
                entry.queued = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_only_while_in_flight() {
        let mut pending = PendingWrites::new();
        let key = CellKey::new("r1", "c1");
        assert!(!pending.queue(&key, "x".into()));

        let first = CellUpdate::new("r1", "c1", "a");
        pending.begin(&first);
        assert!(pending.is_in_flight(&key));
        assert!(pending.queue(&key, "b".into()));

        let done = pending.complete(&first);
        assert_eq!(done.send_next.as_deref(), Some("b"));
        assert!(done.superseded);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_overlapping_sends_count_down() {
        let mut pending = PendingWrites::new();
        let key = CellKey::new("r1", "c1");
        let a = CellUpdate::new("r1", "c1", "a");
        let empty = CellUpdate::new("r1", "c1", "");
        pending.begin(&a);
        pending.begin(&empty);

        let done = pending.complete(&a);
        assert!(done.superseded);
        assert!(pending.is_in_flight(&key));

        let done = pending.complete(&empty);
        assert!(!done.superseded);
        assert_eq!(done.send_next, None);
        assert!(pending.get(&key).is_none());
    }

    #[test]
    fn test_local_edit_after_send_supersedes_it() {
        let mut pending = PendingWrites::new();
        let key = CellKey::new("r1", "c1");
        let sent = CellUpdate::new("r1", "c1", "a");
        pending.mark_edited(&key);
        assert!(pending.get(&key).is_none());

        pending.begin(&sent);
        pending.mark_edited(&key);
        let done = pending.complete(&sent);
        assert!(done.superseded);
        assert_eq!(done.send_next, None);

        pending.begin(&sent);
        assert!(!pending.complete(&sent).superseded);
    }
}

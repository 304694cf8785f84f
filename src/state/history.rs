//! Undo/redo log of cell changes.
//!
//! Replays go through [`CellAccess::write_cell`], which never records
//! history, so undoing cannot itself become an undoable change.

use crate::state::CellAccess;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CellUpdate,
    CellDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellChange {
    pub row_id: String,
    pub column_id: String,
    pub old_value: String,
    pub new_value: String,
}

impl CellChange {
    pub fn new(row_id: &str, column_id: &str, old_value: &str, new_value: &str) -> Self {
        Self {
            row_id: row_id.to_string(),
            column_id: column_id.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub kind: ChangeKind,
    pub changes: Vec<CellChange>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for recorded change-sets.
pub trait HistorySink {
    fn record(&mut self, kind: ChangeKind, changes: Vec<CellChange>);
}

/// Linear log with a cursor.
///
/// `applied` counts the entries currently in effect; entries past it are
/// redoable.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    applied: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            limit: limit.max(1),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Index of the current entry, `None` when nothing is undoable.
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Reverts the current entry. Returns false if there is nothing to undo.
    pub fn undo(&mut self, cells: &mut impl CellAccess) -> bool {
        let Some(index) = self.cursor() else {
            return false;
        };
        let changes = self.entries[index].changes.clone();
        for change in changes.iter().rev() {
            replay(cells, change, &change.old_value);
        }
        self.applied -= 1;
        debug!("undo entry {} ({} changes)", index, changes.len());
        true
    }

    /// Re-applies the next entry. Returns false if there is nothing to redo.
    pub fn redo(&mut self, cells: &mut impl CellAccess) -> bool {
        if !self.can_redo() {
            return false;
        }
        let index = self.applied;
        let changes = self.entries[index].changes.clone();
        for change in &changes {
            replay(cells, change, &change.new_value);
        }
        self.applied += 1;
        debug!("redo entry {} ({} changes)", index, changes.len());
        true
    }

    /// Points recorded changes at a row's confirmed id.
    pub fn remap_row(&mut self, old_id: &str, new_id: &str) {
        for change in self.entries.iter_mut().flat_map(|e| e.changes.iter_mut()) {
            if change.row_id == old_id {
                change.row_id = new_id.to_string();
            }
        }
    }

    /// Points recorded changes at a column's confirmed id.
    pub fn remap_column(&mut self, old_id: &str, new_id: &str) {
        for change in self.entries.iter_mut().flat_map(|e| e.changes.iter_mut()) {
            if change.column_id == old_id {
                change.column_id = new_id.to_string();
            }
        }
    }
}

impl HistorySink for History {
    fn record(&mut self, kind: ChangeKind, changes: Vec<CellChange>) {
        if changes.is_empty() {
            return;
        }
        self.entries.truncate(self.applied);
        self.entries.push(HistoryEntry {
            kind,
            changes,
            timestamp: Utc::now(),
        });
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.applied = self.entries.len();
    }
}

fn replay(cells: &mut impl CellAccess, change: &CellChange, value: &str) {
    if cells.read_cell(&change.row_id, &change.column_id).is_none() {
        warn!(
            "skipping history replay for missing cell {}/{}",
            change.row_id, change.column_id
        );
        return;
    }
    cells.write_cell(&change.row_id, &change.column_id, value);
}

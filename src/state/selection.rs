//! Rectangular multi-cell selection.
//!
//! This module tracks the anchor and the selected cell set. It is independent
//! of focus and editing; the grid decides which ordering is visible and passes
//! it in on every drag move.

use crate::keys::CellKey;
use crate::state::history::{CellChange, ChangeKind, HistorySink};
use crate::state::CellAccess;
use log::warn;
use std::collections::BTreeSet;

/// Selection anchor, selected cells and drag state.
///
/// Responsibilities:
/// - Starting a selection at an anchor cell
/// - Recomputing the rectangle between the anchor and the drag endpoint
/// - Bulk-clearing the selected cells
///
/// Invariant: `selected` is either empty, the anchor alone, or the full
/// rectangle spanned by the anchor and the last accepted endpoint.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    anchor: Option<CellKey>,
    selected: BTreeSet<CellKey>,
    is_dragging: bool,
}

impl SelectionState {
    /// Creates an idle selection with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Queries =====

    pub fn anchor(&self) -> Option<&CellKey> {
        self.anchor.as_ref()
    }

    pub fn selected_cells(&self) -> &BTreeSet<CellKey> {
        &self.selected
    }

    pub fn is_selected(&self, row_id: &str, column_id: &str) -> bool {
        self.selected.contains(&CellKey::new(row_id, column_id))
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    // ===== Drag lifecycle =====

    /// Anchors a new selection at one cell and enters the dragging state.
    pub fn start_selection(&mut self, row_id: &str, column_id: &str) {
        let anchor = CellKey::new(row_id, column_id);
        self.selected.clear();
        self.selected.insert(anchor.clone());
        self.anchor = Some(anchor);
        self.is_dragging = true;
    }

    /// Extends the selection to the rectangle between the anchor and
    /// `(end_row_id, end_column_id)` over the given visible ordering.
    ///
    /// Does nothing when not dragging, or when the anchor or the endpoint is
    /// not part of the ordering (for example, filtered out).
    pub fn update_selection<R, C>(&mut self, end_row_id: &str, end_column_id: &str, rows: &[R], columns: &[C])
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        if !self.is_dragging {
            return;
        }
        let Some(anchor) = self.anchor.as_ref() else {
            return;
        };
        let row_index = |id: &str| rows.iter().position(|r| r.as_ref() == id);
        let column_index = |id: &str| columns.iter().position(|c| c.as_ref() == id);

        let (Some(r0), Some(r1), Some(c0), Some(c1)) = (
            row_index(&anchor.row_id),
            row_index(end_row_id),
            column_index(&anchor.column_id),
            column_index(end_column_id),
        ) else {
            return;
        };

        let (row_lo, row_hi) = (r0.min(r1), r0.max(r1));
        let (col_lo, col_hi) = (c0.min(c1), c0.max(c1));

        self.selected.clear();
        for row in &rows[row_lo..=row_hi] {
            for column in &columns[col_lo..=col_hi] {
                self.selected.insert(CellKey::new(row.as_ref(), column.as_ref()));
            }
        }
    }

    /// Leaves the dragging state; the selected cells are kept.
    pub fn end_selection(&mut self) {
        self.is_dragging = false;
    }

    /// Drops the anchor and every selected cell.
    pub fn clear_selection(&mut self) {
        self.anchor = None;
        self.selected.clear();
        self.is_dragging = false;
    }

    // ===== Bulk operations =====

    /// Clears every selected cell through `cells` and records the whole
    /// operation as a single history entry. Returns the number of cells
    /// cleared.
    ///
    /// Addresses that no longer resolve are logged and skipped.
    pub fn delete_selected_cells(&mut self, cells: &mut impl CellAccess, history: Option<&mut dyn HistorySink>) -> usize {
        let mut changes = Vec::with_capacity(self.selected.len());
        for key in &self.selected {
            let Some(old_value) = cells.read_cell(&key.row_id, &key.column_id) else {
                warn!("selected cell {} no longer exists; skipping", key);
                continue;
            };
            cells.write_cell(&key.row_id, &key.column_id, "");
            changes.push(CellChange::new(&key.row_id, &key.column_id, &old_value, ""));
        }

        let cleared = changes.len();
        if let Some(sink) = history {
            if !changes.is_empty() {
                sink.record(ChangeKind::CellDelete, changes);
            }
        }
        self.clear_selection();
        cleared
    }

    // ===== Id maintenance =====

    /// Follows a row that received its confirmed id.
    pub fn remap_row(&mut self, old_id: &str, new_id: &str) {
        self.remap(|key| key.row_id == old_id, |key| key.row_id = new_id.to_string());
    }

    /// Follows a column that received its confirmed id.
    pub fn remap_column(&mut self, old_id: &str, new_id: &str) {
        self.remap(|key| key.column_id == old_id, |key| key.column_id = new_id.to_string());
    }

    /// Drops cells of a row that was removed.
    pub fn forget_row(&mut self, row_id: &str) {
        self.selected.retain(|k| k.row_id != row_id);
        if self.anchor.as_ref().is_some_and(|a| a.row_id == row_id) {
            self.anchor = None;
            self.is_dragging = false;
        }
    }

    /// Drops cells of a column that was removed.
    pub fn forget_column(&mut self, column_id: &str) {
        self.selected.retain(|k| k.column_id != column_id);
        if self.anchor.as_ref().is_some_and(|a| a.column_id == column_id) {
            self.anchor = None;
            self.is_dragging = false;
        }
    }

    fn remap(&mut self, matches: impl Fn(&CellKey) -> bool, apply: impl Fn(&mut CellKey)) {
        let moved: Vec<CellKey> = self.selected.iter().filter(|k| matches(k)).cloned().collect();
        for mut key in moved {
            self.selected.remove(&key);
            apply(&mut key);
            self.selected.insert(key);
        }
        if let Some(anchor) = self.anchor.as_mut() {
            if matches(anchor) {
                apply(anchor);
            }
        }
    }
}

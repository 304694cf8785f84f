//! Registry of rows and columns the server has not confirmed yet.
//!
//! Edits made against a temporary id cannot be sent (the entity does not
//! exist remotely), so they are buffered here and replayed against the real id
//! once the create call succeeds.

use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TempColumn {
    /// Buffered cell values keyed by row id.
    pub edits: BTreeMap<String, String>,
    /// Name set while the column was still temporary.
    pub pending_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TempRegistry {
    rows: HashMap<String, BTreeMap<String, String>>,
    columns: HashMap<String, TempColumn>,
    abandoned_rows: HashSet<String>,
    abandoned_columns: HashSet<String>,
}

impl TempRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.columns.clear();
        self.abandoned_rows.clear();
        self.abandoned_columns.clear();
    }

    // ===== Rows =====

    pub fn register_row(&mut self, temp_id: &str) {
        self.rows.insert(temp_id.to_string(), BTreeMap::new());
    }

    pub fn is_temp_row(&self, row_id: &str) -> bool {
        self.rows.contains_key(row_id)
    }

    /// Buffers an edit for a temporary row. Returns false if the row is not tracked.
    pub fn buffer_row_edit(&mut self, temp_id: &str, column_id: &str, value: &str) -> bool {
        match self.rows.get_mut(temp_id) {
            Some(edits) => {
                edits.insert(column_id.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn row_edits(&self, temp_id: &str) -> Option<&BTreeMap<String, String>> {
        self.rows.get(temp_id)
    }

    /// Stops tracking a row, returning its buffered edits.
    pub fn take_row(&mut self, temp_id: &str) -> Option<BTreeMap<String, String>> {
        self.rows.remove(temp_id)
    }

    /// Drops a temporary row deleted before confirmation and remembers it so
    /// the server-side row can be removed when the create resolves.
    pub fn abandon_row(&mut self, temp_id: &str) -> bool {
        if self.rows.remove(temp_id).is_some() {
            self.abandoned_rows.insert(temp_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn take_abandoned_row(&mut self, temp_id: &str) -> bool {
        self.abandoned_rows.remove(temp_id)
    }

    // ===== Columns =====

    pub fn register_column(&mut self, temp_id: &str) {
        self.columns.insert(temp_id.to_string(), TempColumn::default());
    }

    pub fn is_temp_column(&self, column_id: &str) -> bool {
        self.columns.contains_key(column_id)
    }

    pub fn buffer_column_edit(&mut self, temp_id: &str, row_id: &str, value: &str) -> bool {
        match self.columns.get_mut(temp_id) {
            Some(column) => {
                column.edits.insert(row_id.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn set_pending_name(&mut self, temp_id: &str, name: &str) -> bool {
        match self.columns.get_mut(temp_id) {
            Some(column) => {
                column.pending_name = Some(name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn take_column(&mut self, temp_id: &str) -> Option<TempColumn> {
        self.columns.remove(temp_id)
    }

    pub fn abandon_column(&mut self, temp_id: &str) -> bool {
        if self.columns.remove(temp_id).is_some() {
            self.abandoned_columns.insert(temp_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn take_abandoned_column(&mut self, temp_id: &str) -> bool {
        self.abandoned_columns.remove(temp_id)
    }

    // ===== Cross-references =====

    /// Re-keys edits buffered in temporary rows after a column got its real id.
    pub fn rename_column_in_rows(&mut self, old_id: &str, new_id: &str) {
        for edits in self.rows.values_mut() {
            if let Some(value) = edits.remove(old_id) {
                edits.insert(new_id.to_string(), value);
            }
        }
    }

    /// Re-keys edits buffered in temporary columns after a row got its real id.
    pub fn rename_row_in_columns(&mut self, old_id: &str, new_id: &str) {
        for column in self.columns.values_mut() {
            if let Some(value) = column.edits.remove(old_id) {
                column.edits.insert(new_id.to_string(), value);
            }
        }
    }

    /// Drops buffered edits for a column that no longer exists.
    pub fn forget_column(&mut self, column_id: &str) {
        for edits in self.rows.values_mut() {
            edits.remove(column_id);
        }
    }

    /// Drops buffered edits for a row that no longer exists.
    pub fn forget_row(&mut self, row_id: &str) {
        for column in self.columns.values_mut() {
            column.edits.remove(row_id);
        }
    }

    pub fn temp_row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn temp_column_count(&self) -> usize {
        self.columns.len()
    }
}

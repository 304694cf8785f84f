//! Keyboard focus, inline editing and column selection.

use crate::keys::CellKey;

/// Focused cell, the cell being edited and its uncommitted text.
#[derive(Debug, Clone, Default)]
pub struct FocusState {
    focused: Option<CellKey>,
    editing: Option<CellKey>,
    draft: String,
    selected_column: Option<String>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<&CellKey> {
        self.focused.as_ref()
    }

    pub fn editing(&self) -> Option<&CellKey> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.selected_column.as_deref()
    }

    pub fn focus(&mut self, key: CellKey) {
        self.focused = Some(key);
    }

    pub fn clear_focus(&mut self) {
        self.focused = None;
    }

    /// Starts editing `key` with `initial` as the draft. Editing also focuses.
    pub fn start_editing(&mut self, key: CellKey, initial: &str) {
        self.focused = Some(key.clone());
        self.editing = Some(key);
        self.draft = initial.to_string();
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    /// Ends editing and hands back the edited cell with its draft.
    pub fn finish_editing(&mut self) -> Option<(CellKey, String)> {
        let key = self.editing.take()?;
        Some((key, std::mem::take(&mut self.draft)))
    }

    /// Ends editing without committing.
    pub fn cancel_editing(&mut self) {
        self.editing = None;
        self.draft.clear();
    }

    /// Selects a whole column, or clears the column selection with `None`.
    pub fn select_column(&mut self, column_id: Option<&str>) {
        self.selected_column = column_id.map(str::to_string);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ===== Id maintenance =====

    pub fn remap_row(&mut self, old_id: &str, new_id: &str) {
        for key in [self.focused.as_mut(), self.editing.as_mut()].into_iter().flatten() {
            if key.row_id == old_id {
                key.row_id = new_id.to_string();
            }
        }
    }

    pub fn remap_column(&mut self, old_id: &str, new_id: &str) {
        for key in [self.focused.as_mut(), self.editing.as_mut()].into_iter().flatten() {
            if key.column_id == old_id {
                key.column_id = new_id.to_string();
            }
        }
        if self.selected_column.as_deref() == Some(old_id) {
            self.selected_column = Some(new_id.to_string());
        }
    }

    pub fn forget_row(&mut self, row_id: &str) {
        if self.focused.as_ref().is_some_and(|k| k.row_id == row_id) {
            self.focused = None;
        }
        if self.editing.as_ref().is_some_and(|k| k.row_id == row_id) {
            self.cancel_editing();
        }
    }

    pub fn forget_column(&mut self, column_id: &str) {
        if self.focused.as_ref().is_some_and(|k| k.column_id == column_id) {
            self.focused = None;
        }
        if self.editing.as_ref().is_some_and(|k| k.column_id == column_id) {
            self.cancel_editing();
        }
        if self.selected_column.as_deref() == Some(column_id) {
            self.selected_column = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editing_round_trip() {
        let mut focus = FocusState::new();
        focus.start_editing(CellKey::new("r1", "c1"), "old");
        focus.set_draft("new");
        let (key, draft) = focus.finish_editing().unwrap();
        assert_eq!(key, CellKey::new("r1", "c1"));
        assert_eq!(draft, "new");
        assert!(!focus.is_editing());
        assert_eq!(focus.focused(), Some(&CellKey::new("r1", "c1")));
    }

    #[test]
    fn test_remap_and_forget() {
        let mut focus = FocusState::new();
        focus.start_editing(CellKey::new("temp-row-1", "c1"), "");
        focus.remap_row("temp-row-1", "row-3");
        assert_eq!(focus.editing().map(|k| k.row_id.as_str()), Some("row-3"));

        focus.select_column(Some("c1"));
        focus.forget_column("c1");
        assert!(focus.focused().is_none());
        assert!(!focus.is_editing());
        assert!(focus.selected_column().is_none());
    }
}

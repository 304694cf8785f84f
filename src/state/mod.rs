//! State management modules for the table engine.
//!
//! This module contains state-only logic (no remote calls):
//! - Table mirror (local and last-confirmed server snapshot)
//! - Temporary row/column registry
//! - Pending cell writes
//! - Selection, focus and view configuration
//! - Undo/redo history

mod focus;
mod history;
mod mirror;
mod pending;
mod selection;
mod table_state;
mod temp_registry;
mod view_state;

pub use focus::FocusState;
pub use history::{CellChange, ChangeKind, History, HistoryEntry, HistorySink};
pub use mirror::TableMirror;
pub use pending::{PendingWrite, PendingWrites, WriteCompletion};
pub use selection::SelectionState;
pub use table_state::TableState;
pub use temp_registry::{TempColumn, TempRegistry};
pub use view_state::{ConditionPatch, ViewState};

/// Read/write access to single cells.
///
/// Writes go through the same path as a user edit but never record history.
pub trait CellAccess {
    /// Current value, or `None` if the row or column does not exist.
    fn read_cell(&self, row_id: &str, column_id: &str) -> Option<String>;

    fn write_cell(&mut self, row_id: &str, column_id: &str, value: &str);
}

//! Mutation adapter: remote write tracking and reconciliation.
//!
//! Every remote write the engine issues is tracked here until it resolves.
//! Resolved calls are turned into local state changes against the mirror and
//! the server snapshot, plus follow-up effects the engine still has to carry
//! out (buffered edits to flush, orphans to delete). Remote errors end here;
//! they are logged and reconciled, never returned to the caller.

use crate::error::RemoteError;
use crate::keys::CellKey;
use crate::model::{CellUpdate, Column, Row};
use crate::remote::{Ack, AddRowResponse, PendingCall};
use crate::state::TableState;
use log::{debug, warn};
use serde::Serialize;

/// Local changes caused by server responses, reported to the session so it
/// can keep ids in history, selection and focus current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Reconciled {
    TableLoaded { table_id: String },
    TableLoadFailed { message: String },
    RowConfirmed { temp_id: String, row_id: String },
    RowRemoved { row_id: String },
    RowRestored { row_id: String },
    ColumnConfirmed { temp_id: String, column_id: String },
    ColumnRemoved { column_id: String },
    ColumnRestored { column_id: String },
    ColumnNameReverted { column_id: String },
    CellReverted { row_id: String, column_id: String },
}

/// A remote write waiting for its response.
pub(crate) enum InFlight {
    AddRow { temp_id: String, call: PendingCall<AddRowResponse> },
    DeleteRow { row_id: String, call: PendingCall<Ack> },
    AddColumn { temp_id: String, call: PendingCall<Column> },
    /// `restore_at` is where the column goes back if the delete fails;
    /// `None` for columns that were never shown with their confirmed id.
    DeleteColumn { column_id: String, restore_at: Option<usize>, call: PendingCall<Ack> },
    RenameColumn { column_id: String, name: String, call: PendingCall<Column> },
    UpdateCell { update: CellUpdate, call: PendingCall<Ack> },
}

/// A resolved remote write.
#[derive(Debug)]
pub(crate) enum Completed {
    AddRow { temp_id: String, result: Result<AddRowResponse, RemoteError> },
    DeleteRow { row_id: String, result: Result<Ack, RemoteError> },
    AddColumn { temp_id: String, result: Result<Column, RemoteError> },
    DeleteColumn { column_id: String, restore_at: Option<usize>, result: Result<Ack, RemoteError> },
    RenameColumn { column_id: String, name: String, result: Result<Column, RemoteError> },
    UpdateCell { update: CellUpdate, result: Result<Ack, RemoteError> },
}

/// Work left for the engine after a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    SendCell(CellUpdate),
    DeleteRow(String),
    DeleteColumn(String),
    RenameColumn { column_id: String, name: String },
    Notify(Reconciled),
}

impl InFlight {
    fn try_complete(&mut self) -> Option<Completed> {
        let completed = match self {
            InFlight::AddRow { temp_id, call } => Completed::AddRow {
                temp_id: temp_id.clone(),
                result: call.try_take()?,
            },
            InFlight::DeleteRow { row_id, call } => Completed::DeleteRow {
                row_id: row_id.clone(),
                result: call.try_take()?,
            },
            InFlight::AddColumn { temp_id, call } => Completed::AddColumn {
                temp_id: temp_id.clone(),
                result: call.try_take()?,
            },
            InFlight::DeleteColumn { column_id, restore_at, call } => Completed::DeleteColumn {
                column_id: column_id.clone(),
                restore_at: *restore_at,
                result: call.try_take()?,
            },
            InFlight::RenameColumn { column_id, name, call } => Completed::RenameColumn {
                column_id: column_id.clone(),
                name: name.clone(),
                result: call.try_take()?,
            },
            InFlight::UpdateCell { update, call } => Completed::UpdateCell {
                update: update.clone(),
                result: call.try_take()?,
            },
        };
        Some(completed)
    }
}

/// Tracks in-flight writes, each tagged with the table epoch it belongs to.
#[derive(Default)]
pub(crate) struct MutationAdapter {
    in_flight: Vec<(u64, InFlight)>,
}

impl MutationAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, epoch: u64, call: InFlight) {
        self.in_flight.push((epoch, call));
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// The number of in-flight writes for `epoch`.
    pub fn len_for(&self, epoch: u64) -> usize {
        self.in_flight.iter().filter(|(e, _)| *e == epoch).count()
    }

    /// Removes and returns every call that has resolved, in issue order.
    pub fn drain_completed(&mut self) -> Vec<(u64, Completed)> {
        let mut completed = Vec::new();
        self.in_flight.retain_mut(|(epoch, call)| match call.try_complete() {
            Some(done) => {
                completed.push((*epoch, done));
                false
            }
            None => true,
        });
        completed
    }
}

/// Applies one resolved write to the table state.
pub(crate) fn reconcile(state: &mut TableState, completed: Completed) -> Vec<Effect> {
    match completed {
        Completed::AddRow { temp_id, result } => reconcile_add_row(state, &temp_id, result),
        Completed::DeleteRow { row_id, result } => reconcile_delete_row(state, &row_id, result),
        Completed::AddColumn { temp_id, result } => reconcile_add_column(state, &temp_id, result),
        Completed::DeleteColumn { column_id, restore_at, result } => {
            reconcile_delete_column(state, &column_id, restore_at, result)
        }
        Completed::RenameColumn { column_id, name, result } => {
            reconcile_rename_column(state, &column_id, &name, result)
        }
        Completed::UpdateCell { update, result } => reconcile_update_cell(state, update, result),
    }
}

// ===== Rows =====

fn reconcile_add_row(state: &mut TableState, temp_id: &str, result: Result<AddRowResponse, RemoteError>) -> Vec<Effect> {
    let mut effects = Vec::new();
    match result {
        Ok(created) => {
            if state.temp.take_abandoned_row(temp_id) {
                debug!("row {} was deleted before confirmation; removing {}", temp_id, created.id);
                effects.push(Effect::DeleteRow(created.id));
                return effects;
            }
            let Some(edits) = state.temp.take_row(temp_id) else {
                warn!("addRow for untracked temp row {} resolved; ignoring", temp_id);
                return effects;
            };

            state
                .mirror
                .replace_row_id(temp_id, &created.id, created.order, created.created_at);
            for (column_id, value) in &edits {
                state.mirror.set_cell(&created.id, column_id, value.clone());
            }
            let server_row = Row::empty(created.id.as_str(), created.order, created.created_at, state.server.columns());
            state.server.insert_row_ordered(server_row);
            state.temp.rename_row_in_columns(temp_id, &created.id);
            debug!("row {} confirmed as {}", temp_id, created.id);

            for (column_id, value) in edits {
                if value.is_empty() || state.mirror.column(&column_id).is_none() {
                    continue;
                }
                if state.temp.is_temp_column(&column_id) {
                    state.temp.buffer_column_edit(&column_id, &created.id, &value);
                } else {
                    effects.push(Effect::SendCell(CellUpdate::new(created.id.as_str(), column_id, value)));
                }
            }
            effects.push(Effect::Notify(Reconciled::RowConfirmed {
                temp_id: temp_id.to_string(),
                row_id: created.id,
            }));
        }
        Err(err) => {
            if state.temp.take_row(temp_id).is_some() {
                warn!("addRow for {} failed ({}); removing the row", temp_id, err);
                state.mirror.remove_row(temp_id);
                state.temp.forget_row(temp_id);
                effects.push(Effect::Notify(Reconciled::RowRemoved {
                    row_id: temp_id.to_string(),
                }));
            } else if state.temp.take_abandoned_row(temp_id) {
                debug!("addRow for abandoned row {} failed ({})", temp_id, err);
            } else {
                warn!("addRow for untracked temp row {} failed ({})", temp_id, err);
            }
        }
    }
    effects
}

fn reconcile_delete_row(state: &mut TableState, row_id: &str, result: Result<Ack, RemoteError>) -> Vec<Effect> {
    match result {
        Ok(_) => {
            state.server.remove_row(row_id);
            Vec::new()
        }
        Err(err) => {
            let original = state.server.row(row_id).cloned();
            match original {
                Some(row) if state.mirror.row(row_id).is_none() => {
                    warn!("deleteRow {} failed ({}); restoring the row", row_id, err);
                    state.mirror.insert_row_ordered(row);
                    vec![Effect::Notify(Reconciled::RowRestored {
                        row_id: row_id.to_string(),
                    })]
                }
                _ => {
                    warn!("deleteRow {} failed ({}); nothing to restore", row_id, err);
                    Vec::new()
                }
            }
        }
    }
}

// ===== Columns =====

fn reconcile_add_column(state: &mut TableState, temp_id: &str, result: Result<Column, RemoteError>) -> Vec<Effect> {
    let mut effects = Vec::new();
    match result {
        Ok(column) => {
            if state.temp.take_abandoned_column(temp_id) {
                debug!("column {} was deleted before confirmation; removing {}", temp_id, column.id);
                effects.push(Effect::DeleteColumn(column.id));
                return effects;
            }
            let Some(buffered) = state.temp.take_column(temp_id) else {
                warn!("addColumn for untracked temp column {} resolved; ignoring", temp_id);
                return effects;
            };

            let local_name = buffered.pending_name.clone().unwrap_or_else(|| column.name.clone());
            let local = Column {
                name: local_name,
                ..column.clone()
            };
            state.mirror.replace_column(temp_id, local);
            state.server.push_column(column.clone());
            state.temp.rename_column_in_rows(temp_id, &column.id);
            debug!("column {} confirmed as {}", temp_id, column.id);

            for (row_id, value) in buffered.edits {
                if value.is_empty() || state.mirror.row(&row_id).is_none() {
                    continue;
                }
                effects.push(Effect::SendCell(CellUpdate::new(row_id, column.id.as_str(), value)));
            }
            if let Some(name) = buffered.pending_name.filter(|n| n != &column.name) {
                effects.push(Effect::RenameColumn {
                    column_id: column.id.clone(),
                    name,
                });
            }
            effects.push(Effect::Notify(Reconciled::ColumnConfirmed {
                temp_id: temp_id.to_string(),
                column_id: column.id,
            }));
        }
        Err(err) => {
            if state.temp.take_column(temp_id).is_some() {
                warn!("addColumn for {} failed ({}); removing the column", temp_id, err);
                state.mirror.remove_column(temp_id);
                state.temp.forget_column(temp_id);
                effects.push(Effect::Notify(Reconciled::ColumnRemoved {
                    column_id: temp_id.to_string(),
                }));
            } else if state.temp.take_abandoned_column(temp_id) {
                debug!("addColumn for abandoned column {} failed ({})", temp_id, err);
            } else {
                warn!("addColumn for untracked temp column {} failed ({})", temp_id, err);
            }
        }
    }
    effects
}

fn reconcile_delete_column(
    state: &mut TableState,
    column_id: &str,
    restore_at: Option<usize>,
    result: Result<Ack, RemoteError>,
) -> Vec<Effect> {
    match result {
        Ok(_) => {
            state.server.remove_column(column_id);
            Vec::new()
        }
        Err(err) => {
            let Some(index) = restore_at else {
                warn!("cleanup delete of column {} failed ({})", column_id, err);
                return Vec::new();
            };
            let original = state.server.column(column_id).cloned();
            match original {
                Some(column) if state.mirror.column(column_id).is_none() => {
                    warn!("deleteColumn {} failed ({}); restoring the column", column_id, err);
                    let values = state.server.column_values(column_id);
                    state.mirror.insert_column_at(index, column, &values);
                    vec![Effect::Notify(Reconciled::ColumnRestored {
                        column_id: column_id.to_string(),
                    })]
                }
                _ => {
                    warn!("deleteColumn {} failed ({}); nothing to restore", column_id, err);
                    Vec::new()
                }
            }
        }
    }
}

fn reconcile_rename_column(
    state: &mut TableState,
    column_id: &str,
    name: &str,
    result: Result<Column, RemoteError>,
) -> Vec<Effect> {
    match result {
        Ok(column) => {
            state.server.rename_column(column_id, &column.name);
            Vec::new()
        }
        Err(err) => {
            let shows_failed_name = state.mirror.column(column_id).is_some_and(|c| c.name == name);
            let confirmed = state.server.column(column_id).map(|c| c.name.clone());
            match confirmed {
                Some(confirmed) if shows_failed_name => {
                    warn!("rename of {} failed ({}); reverting to {:?}", column_id, err, confirmed);
                    state.mirror.rename_column(column_id, &confirmed);
                    vec![Effect::Notify(Reconciled::ColumnNameReverted {
                        column_id: column_id.to_string(),
                    })]
                }
                _ => {
                    warn!("rename of {} failed ({})", column_id, err);
                    Vec::new()
                }
            }
        }
    }
}

// ===== Cells =====

fn reconcile_update_cell(state: &mut TableState, update: CellUpdate, result: Result<Ack, RemoteError>) -> Vec<Effect> {
    let completion = state.pending.complete(&update);
    let mut effects = Vec::new();

    match result {
        Ok(_) => {
            state
                .server
                .set_cell(&update.row_id, &update.column_id, update.value.clone());
        }
        Err(err) if update.value.is_empty() => {
            warn!(
                "clearing {} failed ({}); keeping the cell empty",
                CellKey::new(update.row_id.as_str(), update.column_id.as_str()),
                err
            );
        }
        Err(err) => {
            let still_shown = state.mirror.cell(&update.row_id, &update.column_id) == Some(update.value.as_str());
            if !completion.superseded && still_shown {
                let confirmed = state
                    .server
                    .cell(&update.row_id, &update.column_id)
                    .unwrap_or_default()
                    .to_string();
                warn!(
                    "write to {} failed ({}); reverting to {:?}",
                    CellKey::new(update.row_id.as_str(), update.column_id.as_str()),
                    err,
                    confirmed
                );
                state.mirror.set_cell(&update.row_id, &update.column_id, confirmed);
                effects.push(Effect::Notify(Reconciled::CellReverted {
                    row_id: update.row_id.clone(),
                    column_id: update.column_id.clone(),
                }));
            } else {
                warn!("superseded write to {}/{} failed ({})", update.row_id, update.column_id, err);
            }
        }
    }

    if let Some(next) = completion.send_next {
        effects.push(Effect::SendCell(CellUpdate::new(update.row_id, update.column_id, next)));
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, TableData, TableInfo};
    use chrono::Utc;

    fn state() -> TableState {
        let columns = vec![
            Column::new("c1", "Name", ColumnType::Text, 1),
            Column::new("c2", "Age", ColumnType::Number, 2),
        ];
        let mut row = Row::empty("r1", 1, Utc::now(), &columns);
        row.cells.insert("c1".into(), "Alice".into());
        TableState::from_data(&TableData {
            table: TableInfo {
                id: "t1".into(),
                name: "Table 1".into(),
                base_id: "b1".into(),
            },
            columns,
            rows: vec![row],
        })
    }

    fn rejected() -> RemoteError {
        RemoteError::Rejected("test".into())
    }

    #[test]
    fn test_confirmed_row_flushes_non_empty_edits() {
        let mut s = state();
        s.temp.register_row("temp-row-1");
        s.mirror.push_row(Row::empty("temp-row-1", 2, Utc::now(), &[]));
        s.mirror.set_cell("temp-row-1", "c1", "Bob".into());
        s.temp.buffer_row_edit("temp-row-1", "c1", "Bob");
        s.temp.buffer_row_edit("temp-row-1", "c2", "");

        let effects = reconcile(
            &mut s,
            Completed::AddRow {
                temp_id: "temp-row-1".into(),
                result: Ok(AddRowResponse {
                    id: "r2".into(),
                    order: 2,
                    created_at: Utc::now(),
                    temp_row_id: Some("temp-row-1".into()),
                }),
            },
        );

        assert_eq!(s.mirror.cell("r2", "c1"), Some("Bob"));
        assert!(s.mirror.row("temp-row-1").is_none());
        assert!(s.server.row("r2").is_some());
        assert_eq!(effects[0], Effect::SendCell(CellUpdate::new("r2", "c1", "Bob")));
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_abandoned_row_is_deleted_remotely() {
        let mut s = state();
        s.temp.register_row("temp-row-1");
        s.temp.abandon_row("temp-row-1");
        let before = s.mirror.clone();

        let effects = reconcile(
            &mut s,
            Completed::AddRow {
                temp_id: "temp-row-1".into(),
                result: Ok(AddRowResponse {
                    id: "r9".into(),
                    order: 9,
                    created_at: Utc::now(),
                    temp_row_id: Some("temp-row-1".into()),
                }),
            },
        );
        assert_eq!(effects, vec![Effect::DeleteRow("r9".into())]);
        assert_eq!(s.mirror, before);
    }

    #[test]
    fn test_failed_delete_column_restores_values() {
        let mut s = state();
        let (index, _) = s.mirror.remove_column("c1").unwrap();
        let effects = reconcile(
            &mut s,
            Completed::DeleteColumn {
                column_id: "c1".into(),
                restore_at: Some(index),
                result: Err(rejected()),
            },
        );
        assert_eq!(s.mirror.column_index("c1"), Some(0));
        assert_eq!(s.mirror.cell("r1", "c1"), Some("Alice"));
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_failed_cleanup_delete_never_restores() {
        let mut s = state();
        s.mirror.remove_column("c1");
        let effects = reconcile(
            &mut s,
            Completed::DeleteColumn {
                column_id: "c1".into(),
                restore_at: None,
                result: Err(rejected()),
            },
        );
        assert!(effects.is_empty());
        assert!(s.mirror.column("c1").is_none());
    }

    #[test]
    fn test_failed_write_reverts_only_if_still_shown() {
        let mut s = state();
        let update = CellUpdate::new("r1", "c1", "Alicia");
        s.mirror.set_cell("r1", "c1", "Alicia".into());
        s.pending.begin(&update);
        reconcile(&mut s, Completed::UpdateCell { update, result: Err(rejected()) });
        assert_eq!(s.mirror.cell("r1", "c1"), Some("Alice"));

        let update = CellUpdate::new("r1", "c1", "Alicia");
        s.mirror.set_cell("r1", "c1", "Ally".into());
        s.pending.begin(&update);
        reconcile(&mut s, Completed::UpdateCell { update, result: Err(rejected()) });
        assert_eq!(s.mirror.cell("r1", "c1"), Some("Ally"));
    }

    #[test]
    fn test_failed_clear_is_not_reverted() {
        let mut s = state();
        let update = CellUpdate::new("r1", "c1", "");
        s.mirror.set_cell("r1", "c1", String::new());
        s.pending.begin(&update);
        let effects = reconcile(&mut s, Completed::UpdateCell { update, result: Err(rejected()) });
        assert_eq!(s.mirror.cell("r1", "c1"), Some(""));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_confirmed_write_moves_server_truth_and_releases_queue() {
        let mut s = state();
        let update = CellUpdate::new("r1", "c2", "30");
        s.pending.begin(&update);
        s.pending.queue(&CellKey::new("r1", "c2"), "31".into());
        let effects = reconcile(&mut s, Completed::UpdateCell { update, result: Ok(Ack { success: true }) });
        assert_eq!(s.server.cell("r1", "c2"), Some("30"));
        assert_eq!(effects, vec![Effect::SendCell(CellUpdate::new("r1", "c2", "31"))]);
    }

    #[test]
    fn test_failed_rename_reverts_to_confirmed_name() {
        let mut s = state();
        s.mirror.rename_column("c1", "Full name");
        reconcile(
            &mut s,
            Completed::RenameColumn {
                column_id: "c1".into(),
                name: "Full name".into(),
                result: Err(rejected()),
            },
        );
        assert_eq!(s.mirror.column("c1").map(|c| c.name.as_str()), Some("Name"));
    }
}

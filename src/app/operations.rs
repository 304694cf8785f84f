//! Table operations engine.
//!
//! Owns the optimistic mirror of the active table and exposes the imperative
//! edit operations. Each operation updates the mirror before returning and
//! issues its remote write either immediately or through the cell debouncer.
//! Nothing here blocks: remote results are picked up by [`TableOperations::poll`],
//! which the host calls from its event loop (and after every debounce
//! deadline).

use crate::app::mutations::{reconcile, Completed, Effect, InFlight, MutationAdapter, Reconciled};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::keys::{self, CellKey};
use crate::model::{CellUpdate, Column, IntoCellValue, Row, TableData};
use crate::remote::{
    AddColumnRequest, AddRowRequest, DeleteColumnRequest, DeleteRowRequest, FetchTableRequest, PendingCall,
    RemoteStore, RenameColumnRequest, UpdateCellRequest,
};
use crate::state::{CellAccess, CellChange, ChangeKind, HistorySink, TableMirror, TableState};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Table operations engine for one base.
pub struct TableOperations {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    base_id: String,
    state: Option<TableState>,
    loading: Option<PendingCall<TableData>>,
    debouncer: Debouncer<CellKey, String>,
    mutations: MutationAdapter,
    /// Incremented whenever the active table changes; calls issued under an
    /// older epoch are ignored when they resolve.
    epoch: u64,
}

impl TableOperations {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: EngineConfig, base_id: &str) -> Self {
        let debouncer = Debouncer::new(config.debounce());
        Self {
            store,
            clock,
            config,
            base_id: base_id.to_string(),
            state: None,
            loading: None,
            debouncer,
            mutations: MutationAdapter::new(),
            epoch: 0,
        }
    }

    // ===== Table lifecycle =====

    /// Starts fetching a table (the base's first table for `None`).
    ///
    /// Any active table is left first: debounced writes are sent right away
    /// and responses to calls made for it are ignored from now on.
    pub fn open(&mut self, table_id: Option<&str>) {
        self.leave_table();
        info!("opening table {:?} in base {}", table_id, self.base_id);
        self.loading = Some(self.store.fetch_table_data(FetchTableRequest {
            base_id: self.base_id.clone(),
            table_id: table_id.map(str::to_string),
        }));
    }

    /// Installs fetched table data as the active table.
    pub fn load(&mut self, data: TableData) {
        self.leave_table();
        self.install(&data);
    }

    fn install(&mut self, data: &TableData) {
        info!(
            "table {} active: {} columns, {} rows",
            data.table.id,
            data.columns.len(),
            data.rows.len()
        );
        self.state = Some(TableState::from_data(data));
    }

    fn leave_table(&mut self) {
        if self.state.is_some() {
            self.flush();
        }
        self.debouncer.drain();
        self.state = None;
        self.loading = None;
        self.epoch += 1;
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&TableState> {
        self.state.as_ref()
    }

    pub fn mirror(&self) -> Option<&TableMirror> {
        self.state.as_ref().map(|s| &s.mirror)
    }

    pub fn columns(&self) -> &[Column] {
        self.mirror().map_or(&[], |m| m.columns())
    }

    pub fn rows(&self) -> &[Row] {
        self.mirror().map_or(&[], |m| m.rows())
    }

    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&str> {
        self.mirror()?.cell(row_id, column_id)
    }

    // ===== Cells =====

    /// Writes a cell. The mirror changes immediately.
    ///
    /// Empty values are sent at once and cancel a debounced write for the
    /// same cell; other values are debounced per cell. Cells of rows or
    /// columns the server has not confirmed are buffered instead of sent.
    /// With a `history` sink, a change to a different value is recorded.
    pub fn update_data(
        &mut self,
        row_id: &str,
        column_id: &str,
        value: impl IntoCellValue,
        history: Option<&mut dyn HistorySink>,
    ) {
        let value = value.into_cell_value();
        let Some(state) = self.state.as_mut() else {
            debug!("update of {}/{} ignored: no active table", row_id, column_id);
            return;
        };
        let Some(old) = state.mirror.set_cell(row_id, column_id, value.clone()) else {
            warn!("update of missing cell {}/{} skipped", row_id, column_id);
            return;
        };
        if let Some(sink) = history {
            if old != value {
                sink.record(
                    ChangeKind::CellUpdate,
                    vec![CellChange::new(row_id, column_id, &old, &value)],
                );
            }
        }

        if state.temp.buffer_row_edit(row_id, column_id, &value) {
            debug!("buffered {}/{} until the row is confirmed", row_id, column_id);
            return;
        }
        if state.temp.buffer_column_edit(column_id, row_id, &value) {
            debug!("buffered {}/{} until the column is confirmed", row_id, column_id);
            return;
        }

        let key = CellKey::new(row_id, column_id);
        if value.is_empty() {
            self.debouncer.cancel(&key);
            self.issue_cell_write(CellUpdate::new(row_id, column_id, value));
        } else {
            state.pending.mark_edited(&key);
            self.debouncer.schedule(key, value, self.clock.now());
        }
    }

    /// Sends a cell write unless one is already in flight for the cell, in
    /// which case the value waits for it.
    fn send_cell(&mut self, update: CellUpdate) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let key = CellKey::new(update.row_id.as_str(), update.column_id.as_str());
        if state.pending.queue(&key, update.value.clone()) {
            debug!("write to {} queued behind an in-flight write", key);
            return;
        }
        self.issue_cell_write(update);
    }

    fn issue_cell_write(&mut self, update: CellUpdate) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.pending.begin(&update);
        debug!("updateCell {}/{} = {:?}", update.row_id, update.column_id, update.value);
        let call = self.store.update_cell(UpdateCellRequest {
            base_id: state.base_id().to_string(),
            table_id: state.table_id().to_string(),
            row_id: update.row_id.clone(),
            column_id: update.column_id.clone(),
            value: update.value.clone(),
        });
        self.mutations.track(self.epoch, InFlight::UpdateCell { update, call });
    }

    // ===== Rows =====

    /// Appends an empty row under a temporary id and asks the server to
    /// create it. Returns the temporary id.
    pub fn add_row(&mut self) -> Option<String> {
        let state = self.state.as_mut()?;
        let temp_id = keys::temp_row_id();
        state.temp.register_row(&temp_id);
        let order = state.mirror.next_row_order();
        let row = Row::empty(temp_id.as_str(), order, Utc::now(), state.mirror.columns());
        state.mirror.push_row(row);

        debug!("addRow {}", temp_id);
        let call = self.store.add_row(AddRowRequest {
            base_id: state.base_id().to_string(),
            table_id: state.table_id().to_string(),
            temp_row_id: Some(temp_id.clone()),
        });
        self.mutations.track(
            self.epoch,
            InFlight::AddRow {
                temp_id: temp_id.clone(),
                call,
            },
        );
        Some(temp_id)
    }

    /// Removes a row. Returns false if the row does not exist.
    ///
    /// A row the server has not confirmed is dropped locally only; the
    /// server copy is deleted once its create call resolves.
    pub fn delete_row(&mut self, row_id: &str) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if state.mirror.remove_row(row_id).is_none() {
            return false;
        }
        self.debouncer.retain(|k| k.row_id != row_id);
        state.pending.forget_row(row_id);
        state.temp.forget_row(row_id);

        if state.temp.abandon_row(row_id) {
            debug!("temp row {} deleted before confirmation", row_id);
            return true;
        }
        self.issue_delete_row(row_id.to_string());
        true
    }

    fn issue_delete_row(&mut self, row_id: String) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        debug!("deleteRow {}", row_id);
        let call = self.store.delete_row(DeleteRowRequest {
            base_id: state.base_id().to_string(),
            row_id: row_id.clone(),
        });
        self.mutations.track(self.epoch, InFlight::DeleteRow { row_id, call });
    }

    // ===== Columns =====

    /// Appends a column with the default name and type under a temporary id.
    /// Returns the temporary id.
    pub fn add_column(&mut self) -> Option<String> {
        let state = self.state.as_mut()?;
        let name = self.config.default_column_name.clone();
        let column_type = self.config.default_column_type;
        let temp_id = keys::temp_column_id(&name);
        state.temp.register_column(&temp_id);
        let order = state.mirror.next_column_order();
        state
            .mirror
            .push_column(Column::new(temp_id.as_str(), name.as_str(), column_type, order));

        debug!("addColumn {} ({:?})", temp_id, name);
        let call = self.store.add_column(AddColumnRequest {
            base_id: state.base_id().to_string(),
            table_id: state.table_id().to_string(),
            name,
            column_type,
        });
        self.mutations.track(
            self.epoch,
            InFlight::AddColumn {
                temp_id: temp_id.clone(),
                call,
            },
        );
        Some(temp_id)
    }

    /// Removes a column and its cells. Refuses to remove the last column.
    pub fn delete_column(&mut self, column_id: &str) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if state.mirror.columns().len() <= 1 {
            debug!("refusing to delete the last column {}", column_id);
            return false;
        }
        let Some((index, _)) = state.mirror.remove_column(column_id) else {
            return false;
        };
        self.debouncer.retain(|k| k.column_id != column_id);
        state.pending.forget_column(column_id);
        state.temp.forget_column(column_id);

        if state.temp.abandon_column(column_id) {
            debug!("temp column {} deleted before confirmation", column_id);
            return true;
        }
        self.issue_delete_column(column_id.to_string(), Some(index));
        true
    }

    fn issue_delete_column(&mut self, column_id: String, restore_at: Option<usize>) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        debug!("deleteColumn {}", column_id);
        let call = self.store.delete_column(DeleteColumnRequest {
            base_id: state.base_id().to_string(),
            column_id: column_id.clone(),
        });
        self.mutations.track(
            self.epoch,
            InFlight::DeleteColumn {
                column_id,
                restore_at,
                call,
            },
        );
    }

    /// Renames a column. Returns false if the column does not exist.
    pub fn update_column_name(&mut self, column_id: &str, name: &str) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if state.mirror.rename_column(column_id, name).is_none() {
            return false;
        }
        if state.temp.set_pending_name(column_id, name) {
            debug!("rename of temp column {} deferred", column_id);
            return true;
        }
        self.issue_rename(column_id.to_string(), name.to_string());
        true
    }

    fn issue_rename(&mut self, column_id: String, name: String) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        debug!("updateColumnName {} = {:?}", column_id, name);
        let call = self.store.update_column_name(RenameColumnRequest {
            base_id: state.base_id().to_string(),
            column_id: column_id.clone(),
            name: name.clone(),
        });
        self.mutations
            .track(self.epoch, InFlight::RenameColumn { column_id, name, call });
    }

    // ===== Event loop =====

    /// Sends debounced writes that are due and applies every remote result
    /// that has arrived. Returns what changed locally as a result.
    pub fn poll(&mut self) -> Vec<Reconciled> {
        let mut events = Vec::new();
        self.poll_loading(&mut events);

        for (key, value) in self.debouncer.take_due(self.clock.now()) {
            self.send_cell(CellUpdate::new(key.row_id, key.column_id, value));
        }

        loop {
            let completed = self.mutations.drain_completed();
            if completed.is_empty() {
                break;
            }
            for (epoch, done) in completed {
                self.apply_completed(epoch, done, &mut events);
            }
        }
        events
    }

    fn poll_loading(&mut self, events: &mut Vec<Reconciled>) {
        let Some(call) = self.loading.as_mut() else {
            return;
        };
        let Some(result) = call.try_take() else {
            return;
        };
        self.loading = None;
        match result {
            Ok(data) => {
                self.install(&data);
                events.push(Reconciled::TableLoaded { table_id: data.table.id });
            }
            Err(err) => {
                warn!("fetchTableData for base {} failed: {}", self.base_id, err);
                events.push(Reconciled::TableLoadFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    fn apply_completed(&mut self, epoch: u64, done: Completed, events: &mut Vec<Reconciled>) {
        if epoch != self.epoch {
            debug!("ignoring result from a previous table: {:?}", done);
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        for effect in reconcile(state, done) {
            match effect {
                Effect::SendCell(update) => self.send_cell(update),
                Effect::DeleteRow(row_id) => self.issue_delete_row(row_id),
                Effect::DeleteColumn(column_id) => self.issue_delete_column(column_id, None),
                Effect::RenameColumn { column_id, name } => self.issue_rename(column_id, name),
                Effect::Notify(event) => events.push(event),
            }
        }
    }

    /// Sends every debounced write now, regardless of its deadline.
    pub fn flush(&mut self) {
        for (key, value) in self.debouncer.drain() {
            self.send_cell(CellUpdate::new(key.row_id, key.column_id, value));
        }
    }

    /// When the next debounced write is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// True while edits to the active table are waiting to be sent or
    /// confirmed.
    pub fn has_unsynced_changes(&self) -> bool {
        let buffered = self
            .state
            .as_ref()
            .is_some_and(|s| s.temp.temp_row_count() + s.temp.temp_column_count() > 0);
        !self.debouncer.is_empty() || self.mutations.len_for(self.epoch) > 0 || buffered
    }

    /// Remote writes still waiting for a response, across all tables.
    pub fn in_flight_count(&self) -> usize {
        self.mutations.len()
    }
}

/// Undo/redo and bulk operations write through here; no history is recorded.
impl CellAccess for TableOperations {
    fn read_cell(&self, row_id: &str, column_id: &str) -> Option<String> {
        self.cell(row_id, column_id).map(str::to_string)
    }

    fn write_cell(&mut self, row_id: &str, column_id: &str, value: &str) {
        self.update_data(row_id, column_id, value, None);
    }
}

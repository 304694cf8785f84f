//! In-memory remote store.
//!
//! A complete implementation of the remote procedures backed by plain
//! collections, used by the tests and the replay tool. Calls either resolve
//! as soon as they are made or wait in a queue until the owner resolves them,
//! which lets a test interleave local edits with server confirmations in any
//! order. Failures can be injected per operation, and every call is logged.

use super::{
    pending_call, Ack, AddColumnRequest, AddRowRequest, AddRowResponse, DeleteColumnRequest,
    DeleteRowRequest, FetchTableRequest, GetViewRequest, PendingCall, RemoteStore,
    RenameColumnRequest, UpdateCellRequest, UpdateViewRequest,
};
use crate::error::RemoteError;
use crate::model::{Column, ColumnType, Row, TableData, TableInfo, View, ViewConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Remote procedure names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    FetchTableData,
    AddColumn,
    DeleteColumn,
    UpdateColumnName,
    AddRow,
    DeleteRow,
    UpdateCell,
    GetTableView,
    UpdateView,
}

/// One logged call with its request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", content = "request", rename_all = "camelCase")]
pub enum RemoteCall {
    FetchTableData(FetchTableRequest),
    AddColumn(AddColumnRequest),
    DeleteColumn(DeleteColumnRequest),
    UpdateColumnName(RenameColumnRequest),
    AddRow(AddRowRequest),
    DeleteRow(DeleteRowRequest),
    UpdateCell(UpdateCellRequest),
    GetTableView(GetViewRequest),
    UpdateView(UpdateViewRequest),
}

impl RemoteCall {
    pub fn operation(&self) -> Operation {
        match self {
            RemoteCall::FetchTableData(_) => Operation::FetchTableData,
            RemoteCall::AddColumn(_) => Operation::AddColumn,
            RemoteCall::DeleteColumn(_) => Operation::DeleteColumn,
            RemoteCall::UpdateColumnName(_) => Operation::UpdateColumnName,
            RemoteCall::AddRow(_) => Operation::AddRow,
            RemoteCall::DeleteRow(_) => Operation::DeleteRow,
            RemoteCall::UpdateCell(_) => Operation::UpdateCell,
            RemoteCall::GetTableView(_) => Operation::GetTableView,
            RemoteCall::UpdateView(_) => Operation::UpdateView,
        }
    }
}

/// When calls resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Each call resolves before the method returns.
    Immediate,
    /// Calls wait until `resolve_*` is called.
    Manual,
}

struct BaseRecord {
    owner: String,
    #[allow(dead_code)]
    name: String,
}

struct RowRecord {
    table_id: String,
    id: String,
    order: i64,
    created_at: DateTime<Utc>,
}

struct Database {
    user_id: String,
    bases: HashMap<String, BaseRecord>,
    tables: Vec<TableInfo>,
    columns: Vec<(String, Column)>,
    rows: Vec<RowRecord>,
    cells: HashMap<(String, String), String>,
    views: Vec<View>,
    next_id: u64,
}

type Job = Box<dyn FnOnce(&mut Database, Option<RemoteError>) + Send>;

struct Deferred {
    operation: Operation,
    job: Job,
}

struct Inner {
    db: Database,
    resolution: Resolution,
    queue: VecDeque<Deferred>,
    failures: HashMap<Operation, usize>,
    calls: Vec<RemoteCall>,
}

impl Inner {
    fn take_failure(&mut self, operation: Operation) -> Option<RemoteError> {
        let remaining = self.failures.get_mut(&operation)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(RemoteError::Rejected(format!("injected {:?} failure", operation)))
    }
}

/// Shared handle to an in-memory remote store. Clones share state.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates an empty store whose calls resolve immediately.
    pub fn new() -> Self {
        Self::with_resolution(Resolution::Immediate)
    }

    pub fn with_resolution(resolution: Resolution) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                db: Database {
                    user_id: "user-1".to_string(),
                    bases: HashMap::new(),
                    tables: Vec::new(),
                    columns: Vec::new(),
                    rows: Vec::new(),
                    cells: HashMap::new(),
                    views: Vec::new(),
                    next_id: 0,
                },
                resolution,
                queue: VecDeque::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        self.lock().resolution = resolution;
    }

    // ===== Seeding =====

    /// Creates a base owned by the calling user.
    pub fn create_base(&self, name: &str) -> String {
        let mut inner = self.lock();
        let owner = inner.db.user_id.clone();
        inner.db.insert_base(name, owner)
    }

    /// Creates a base owned by someone else.
    pub fn create_foreign_base(&self, name: &str, owner: &str) -> String {
        self.lock().db.insert_base(name, owner.to_string())
    }

    /// Fills the base's default table with text columns and empty rows.
    ///
    /// Bypasses the call log.
    pub fn seed_table(&self, base_id: &str, column_names: &[&str], row_count: usize) -> Result<TableData, RemoteError> {
        let mut inner = self.lock();
        let db = &mut inner.db;
        let table = db.resolve_table(base_id, None)?;
        for name in column_names {
            db.insert_column(&table.id, name, ColumnType::Text)?;
        }
        for _ in 0..row_count {
            db.insert_row(&table.id);
        }
        db.fetch(base_id, Some(&table.id))
    }

    /// Makes the next `count` calls of `operation` fail when they resolve.
    pub fn fail_next(&self, operation: Operation, count: usize) {
        *self.lock().failures.entry(operation).or_insert(0) += count;
    }

    // ===== Manual resolution =====

    /// Number of calls waiting to resolve.
    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// Operations of the waiting calls, oldest first.
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.lock().queue.iter().map(|d| d.operation).collect()
    }

    /// Resolves the oldest waiting call. Returns false if none is waiting.
    pub fn resolve_next(&self) -> bool {
        self.resolve_where(|_| true, None)
    }

    /// Resolves every waiting call in order, returning how many resolved.
    pub fn resolve_all(&self) -> usize {
        let mut resolved = 0;
        while self.resolve_next() {
            resolved += 1;
        }
        resolved
    }

    /// Resolves the oldest waiting call of `operation`.
    pub fn resolve_first(&self, operation: Operation) -> bool {
        self.resolve_where(|op| op == operation, None)
    }

    /// Fails the oldest waiting call of `operation` with `error`.
    pub fn fail_first(&self, operation: Operation, error: RemoteError) -> bool {
        self.resolve_where(|op| op == operation, Some(error))
    }

    /// Drops the oldest waiting call of `operation` without answering it.
    pub fn drop_first(&self, operation: Operation) -> bool {
        let mut inner = self.lock();
        match inner.queue.iter().position(|d| d.operation == operation) {
            Some(index) => {
                inner.queue.remove(index);
                true
            }
            None => false,
        }
    }

    fn resolve_where(&self, matches: impl Fn(Operation) -> bool, forced: Option<RemoteError>) -> bool {
        let mut inner = self.lock();
        let Some(index) = inner.queue.iter().position(|d| matches(d.operation)) else {
            return false;
        };
        let Some(deferred) = inner.queue.remove(index) else {
            return false;
        };
        let failure = forced.or_else(|| inner.take_failure(deferred.operation));
        (deferred.job)(&mut inner.db, failure);
        true
    }

    fn submit<T, F>(&self, call: RemoteCall, op: F) -> PendingCall<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T, RemoteError> + Send + 'static,
    {
        let (responder, pending) = pending_call();
        let operation = call.operation();
        let job: Job = Box::new(move |db, failure| {
            let result = match failure {
                Some(error) => Err(error),
                None => op(db),
            };
            responder.resolve(result);
        });

        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.resolution {
            Resolution::Immediate => {
                let failure = inner.take_failure(operation);
                job(&mut inner.db, failure);
            }
            Resolution::Manual => inner.queue.push_back(Deferred { operation, job }),
        }
        pending
    }

    // ===== Inspection =====

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, operation: Operation) -> Vec<RemoteCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock().calls.iter().filter(|c| c.operation() == operation).count()
    }

    /// Logged `updateCell` requests, oldest first.
    pub fn cell_updates(&self) -> Vec<UpdateCellRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RemoteCall::UpdateCell(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Stored value of a cell, if the cell exists.
    pub fn cell_value(&self, row_id: &str, column_id: &str) -> Option<String> {
        self.lock()
            .db
            .cells
            .get(&(row_id.to_string(), column_id.to_string()))
            .cloned()
    }

    /// Reads the default table without logging a call.
    pub fn table_data(&self, base_id: &str) -> Option<TableData> {
        self.lock().db.fetch(base_id, None).ok()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for InMemoryStore {
    fn fetch_table_data(&self, request: FetchTableRequest) -> PendingCall<TableData> {
        let req = request.clone();
        self.submit(RemoteCall::FetchTableData(request), move |db| {
            let table = db.resolve_table(&req.base_id, req.table_id.as_deref())?;
            db.fetch(&req.base_id, Some(&table.id))
        })
    }

    fn add_column(&self, request: AddColumnRequest) -> PendingCall<Column> {
        let req = request.clone();
        self.submit(RemoteCall::AddColumn(request), move |db| {
            let table = db.resolve_table(&req.base_id, Some(&req.table_id))?;
            db.insert_column(&table.id, &req.name, req.column_type)
        })
    }

    fn delete_column(&self, request: DeleteColumnRequest) -> PendingCall<Ack> {
        let req = request.clone();
        self.submit(RemoteCall::DeleteColumn(request), move |db| {
            db.owned_base(&req.base_id)?;
            let index = db.column_index_in_base(&req.base_id, &req.column_id)?;
            db.columns.remove(index);
            db.cells.retain(|(_, col), _| col != &req.column_id);
            Ok(Ack { success: true })
        })
    }

    fn update_column_name(&self, request: RenameColumnRequest) -> PendingCall<Column> {
        let req = request.clone();
        self.submit(RemoteCall::UpdateColumnName(request), move |db| {
            db.owned_base(&req.base_id)?;
            if req.name.trim().is_empty() {
                return Err(RemoteError::Rejected("column name must not be empty".into()));
            }
            let index = db.column_index_in_base(&req.base_id, &req.column_id)?;
            let column = &mut db.columns[index].1;
            column.name = req.name.clone();
            Ok(column.clone())
        })
    }

    fn add_row(&self, request: AddRowRequest) -> PendingCall<AddRowResponse> {
        let req = request.clone();
        self.submit(RemoteCall::AddRow(request), move |db| {
            let table = db.resolve_table(&req.base_id, Some(&req.table_id))?;
            let record = db.insert_row(&table.id);
            Ok(AddRowResponse {
                id: record.0,
                order: record.1,
                created_at: record.2,
                temp_row_id: req.temp_row_id.clone(),
            })
        })
    }

    fn delete_row(&self, request: DeleteRowRequest) -> PendingCall<Ack> {
        let req = request.clone();
        self.submit(RemoteCall::DeleteRow(request), move |db| {
            db.owned_base(&req.base_id)?;
            let table_ids = db.table_ids(&req.base_id);
            let index = db
                .rows
                .iter()
                .position(|r| r.id == req.row_id && table_ids.contains(&r.table_id))
                .ok_or_else(|| RemoteError::NotFound(format!("row {}", req.row_id)))?;
            db.rows.remove(index);
            db.cells.retain(|(row, _), _| row != &req.row_id);
            Ok(Ack { success: true })
        })
    }

    fn update_cell(&self, request: UpdateCellRequest) -> PendingCall<Ack> {
        let req = request.clone();
        self.submit(RemoteCall::UpdateCell(request), move |db| {
            let table = db.resolve_table(&req.base_id, Some(&req.table_id))?;
            if !db.rows.iter().any(|r| r.id == req.row_id && r.table_id == table.id) {
                return Err(RemoteError::NotFound(format!("row {}", req.row_id)));
            }
            if !db.columns.iter().any(|(t, c)| c.id == req.column_id && t == &table.id) {
                return Err(RemoteError::NotFound(format!("column {}", req.column_id)));
            }
            db.cells
                .insert((req.row_id.clone(), req.column_id.clone()), req.value.clone());
            Ok(Ack { success: true })
        })
    }

    fn get_table_view(&self, request: GetViewRequest) -> PendingCall<View> {
        let req = request.clone();
        self.submit(RemoteCall::GetTableView(request), move |db| {
            let table = db.resolve_table(&req.base_id, Some(&req.table_id))?;
            if let Some(view) = db.views.iter().find(|v| v.table_id == table.id && v.is_default) {
                return Ok(view.clone());
            }
            let view = View {
                id: db.mint_id("view"),
                name: "Grid view".to_string(),
                table_id: table.id.clone(),
                is_default: true,
                config: ViewConfig::default(),
            };
            db.views.push(view.clone());
            Ok(view)
        })
    }

    fn update_view(&self, request: UpdateViewRequest) -> PendingCall<View> {
        let req = request.clone();
        self.submit(RemoteCall::UpdateView(request), move |db| {
            db.owned_base(&req.base_id)?;
            let table_ids = db.table_ids(&req.base_id);
            let view = db
                .views
                .iter_mut()
                .find(|v| v.id == req.view_id && table_ids.contains(&v.table_id))
                .ok_or_else(|| RemoteError::NotFound(format!("view {}", req.view_id)))?;
            if let Some(filters) = req.filters {
                view.config.filters = filters;
            }
            if let Some(sorts) = req.sorts {
                view.config.sorts = sorts;
            }
            if let Some(hidden) = req.hidden_columns {
                view.config.hidden_columns = hidden;
            }
            Ok(view.clone())
        })
    }
}

impl Database {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn insert_base(&mut self, name: &str, owner: String) -> String {
        let id = self.mint_id("base");
        self.bases.insert(
            id.clone(),
            BaseRecord {
                owner,
                name: name.to_string(),
            },
        );
        id
    }

    fn owned_base(&self, base_id: &str) -> Result<(), RemoteError> {
        match self.bases.get(base_id) {
            None => Err(RemoteError::NotFound(format!("base {}", base_id))),
            Some(base) if base.owner != self.user_id => Err(RemoteError::Unauthorized(base_id.to_string())),
            Some(_) => Ok(()),
        }
    }

    fn table_ids(&self, base_id: &str) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| t.base_id == base_id)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Finds the requested table, or the base's first table, creating the
    /// default table on first access.
    fn resolve_table(&mut self, base_id: &str, table_id: Option<&str>) -> Result<TableInfo, RemoteError> {
        self.owned_base(base_id)?;
        if let Some(table_id) = table_id {
            return self
                .tables
                .iter()
                .find(|t| t.id == table_id && t.base_id == base_id)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(format!("table {}", table_id)));
        }
        if let Some(table) = self.tables.iter().find(|t| t.base_id == base_id) {
            return Ok(table.clone());
        }
        let table = TableInfo {
            id: self.mint_id("table"),
            name: "Table 1".to_string(),
            base_id: base_id.to_string(),
        };
        self.tables.push(table.clone());
        Ok(table)
    }

    fn column_index_in_base(&self, base_id: &str, column_id: &str) -> Result<usize, RemoteError> {
        let table_ids = self.table_ids(base_id);
        self.columns
            .iter()
            .position(|(t, c)| c.id == column_id && table_ids.contains(t))
            .ok_or_else(|| RemoteError::NotFound(format!("column {}", column_id)))
    }

    fn insert_column(&mut self, table_id: &str, name: &str, column_type: ColumnType) -> Result<Column, RemoteError> {
        if name.trim().is_empty() {
            return Err(RemoteError::Rejected("column name must not be empty".into()));
        }
        let order = self
            .columns
            .iter()
            .filter(|(t, _)| t == table_id)
            .map(|(_, c)| c.order)
            .max()
            .unwrap_or(0)
            + 1;
        let column = Column::new(self.mint_id("col"), name, column_type, order);
        self.columns.push((table_id.to_string(), column.clone()));
        Ok(column)
    }

    /// Appends a row with one empty cell per column.
    fn insert_row(&mut self, table_id: &str) -> (String, i64, DateTime<Utc>) {
        let order = self
            .rows
            .iter()
            .filter(|r| r.table_id == table_id)
            .map(|r| r.order)
            .max()
            .unwrap_or(0)
            + 1;
        let id = self.mint_id("row");
        let created_at = Utc::now();
        let column_ids: Vec<String> = self
            .columns
            .iter()
            .filter(|(t, _)| t == table_id)
            .map(|(_, c)| c.id.clone())
            .collect();
        for column_id in column_ids {
            self.cells.insert((id.clone(), column_id), String::new());
        }
        self.rows.push(RowRecord {
            table_id: table_id.to_string(),
            id: id.clone(),
            order,
            created_at,
        });
        (id, order, created_at)
    }

    fn fetch(&self, base_id: &str, table_id: Option<&str>) -> Result<TableData, RemoteError> {
        self.owned_base(base_id)?;
        let table = match table_id {
            Some(id) => self.tables.iter().find(|t| t.id == id && t.base_id == base_id),
            None => self.tables.iter().find(|t| t.base_id == base_id),
        }
        .cloned()
        .ok_or_else(|| RemoteError::NotFound(format!("table in base {}", base_id)))?;

        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|(t, _)| t == &table.id)
            .map(|(_, c)| c.clone())
            .collect();
        columns.sort_by_key(|c| c.order);

        let mut records: Vec<&RowRecord> = self.rows.iter().filter(|r| r.table_id == table.id).collect();
        records.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = Row::empty(record.id.clone(), record.order, record.created_at, &columns);
                for (column_id, value) in row.cells.iter_mut() {
                    if let Some(stored) = self.cells.get(&(record.id.clone(), column_id.clone())) {
                        *value = stored.clone();
                    }
                }
                row
            })
            .collect();

        Ok(TableData { table, columns, rows })
    }
}

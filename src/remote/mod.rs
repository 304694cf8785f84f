//! Remote store interface consumed by the table engine.
//!
//! Every operation returns immediately with a [`PendingCall`]; the engine
//! checks for completion from its event loop. The engine assumes nothing about
//! transport beyond the request and response shapes and the success/error
//! split.

pub mod memory;

use crate::error::RemoteError;
use crate::model::{Column, ColumnType, FilterGroup, SortConfig, TableData, View};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Completion handle for one remote call.
pub struct PendingCall<T> {
    receiver: Receiver<Result<T, RemoteError>>,
}

/// Sending half of a [`PendingCall`], held by the transport.
pub struct Responder<T> {
    sender: Sender<Result<T, RemoteError>>,
}

/// Creates a connected responder/pending-call pair.
pub fn pending_call<T>() -> (Responder<T>, PendingCall<T>) {
    let (sender, receiver) = channel();
    (Responder { sender }, PendingCall { receiver })
}

impl<T> PendingCall<T> {
    /// A call that has already resolved.
    pub fn ready(result: Result<T, RemoteError>) -> Self {
        let (responder, pending) = pending_call();
        responder.resolve(result);
        pending
    }

    /// Returns the result if the call has resolved.
    ///
    /// A responder dropped without answering reads as
    /// [`RemoteError::Disconnected`]. Call at most once after `Some`.
    pub fn try_take(&mut self) -> Option<Result<T, RemoteError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RemoteError::Disconnected)),
        }
    }
}

impl<T> Responder<T> {
    pub fn resolve(self, result: Result<T, RemoteError>) {
        // The caller may have dropped the pending call (table switch); nothing to do.
        let _ = self.sender.send(result);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTableRequest {
    pub base_id: String,
    pub table_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnRequest {
    pub base_id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteColumnRequest {
    pub base_id: String,
    pub column_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameColumnRequest {
    pub base_id: String,
    pub column_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRowRequest {
    pub base_id: String,
    pub table_id: String,
    /// Correlation token echoed back in the response.
    pub temp_row_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRowResponse {
    pub id: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub temp_row_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowRequest {
    pub base_id: String,
    pub row_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellRequest {
    pub base_id: String,
    pub table_id: String,
    pub row_id: String,
    pub column_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetViewRequest {
    pub base_id: String,
    pub table_id: String,
}

/// Partial view update; `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateViewRequest {
    pub base_id: String,
    pub view_id: String,
    pub filters: Option<FilterGroup>,
    pub sorts: Option<Vec<SortConfig>>,
    pub hidden_columns: Option<Vec<String>>,
}

/// `{ success }` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// The remote procedures the engine calls.
///
/// Implementations must not block; long-running work resolves the returned
/// call later.
pub trait RemoteStore {
    fn fetch_table_data(&self, request: FetchTableRequest) -> PendingCall<TableData>;

    fn add_column(&self, request: AddColumnRequest) -> PendingCall<Column>;

    fn delete_column(&self, request: DeleteColumnRequest) -> PendingCall<Ack>;

    fn update_column_name(&self, request: RenameColumnRequest) -> PendingCall<Column>;

    fn add_row(&self, request: AddRowRequest) -> PendingCall<AddRowResponse>;

    fn delete_row(&self, request: DeleteRowRequest) -> PendingCall<Ack>;

    fn update_cell(&self, request: UpdateCellRequest) -> PendingCall<Ack>;

    fn get_table_view(&self, request: GetViewRequest) -> PendingCall<View>;

    fn update_view(&self, request: UpdateViewRequest) -> PendingCall<View>;
}

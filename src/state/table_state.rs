//! Everything the engine knows about the active table.

use crate::model::{TableData, TableInfo};
use crate::state::{PendingWrites, TableMirror, TempRegistry};

/// Local mirror, last known server state and the in-flight bookkeeping.
///
/// `mirror` is what the grid shows and is updated optimistically; `server`
/// only moves when the remote store confirms a change and is the rollback
/// source.
#[derive(Debug, Clone)]
pub struct TableState {
    pub table: TableInfo,
    pub mirror: TableMirror,
    pub server: TableMirror,
    pub temp: TempRegistry,
    pub pending: PendingWrites,
}

impl TableState {
    pub fn from_data(data: &TableData) -> Self {
        let mirror = TableMirror::from_data(data);
        Self {
            table: data.table.clone(),
            server: mirror.clone(),
            mirror,
            temp: TempRegistry::new(),
            pending: PendingWrites::new(),
        }
    }

    pub fn base_id(&self) -> &str {
        &self.table.base_id
    }

    pub fn table_id(&self) -> &str {
        &self.table.id
    }
}

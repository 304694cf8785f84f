//! Table data model shared by the mirror, the remote store and the evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Select,
    Date,
    Attachment,
}

/// A typed column. `order` determines display position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub order: i64,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: ColumnType, order: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type,
            order,
        }
    }
}

/// A row of cells keyed by column id.
///
/// Every existing column has an entry; missing values read as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub order: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub cells: BTreeMap<String, String>,
}

impl Row {
    /// Creates a row with an empty value for each of `columns`.
    pub fn empty(id: impl Into<String>, order: i64, created_at: DateTime<Utc>, columns: &[Column]) -> Self {
        Self {
            id: id.into(),
            order,
            created_at,
            cells: columns.iter().map(|c| (c.id.clone(), String::new())).collect(),
        }
    }

    /// Returns the value of a cell, `""` when absent.
    pub fn value(&self, column_id: &str) -> &str {
        self.cells.get(column_id).map(String::as_str).unwrap_or("")
    }
}

/// Table header returned by `fetchTableData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "baseId")]
    pub base_id: String,
}

/// Full table contents as fetched from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub table: TableInfo,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

/// Conversion of caller-supplied values into cell text.
///
/// Absent values (`None`) become `""`, so the mirror never stores a null.
pub trait IntoCellValue {
    fn into_cell_value(self) -> String;
}

impl IntoCellValue for String {
    fn into_cell_value(self) -> String {
        self
    }
}

impl IntoCellValue for &str {
    fn into_cell_value(self) -> String {
        self.to_string()
    }
}

impl IntoCellValue for &String {
    fn into_cell_value(self) -> String {
        self.clone()
    }
}

impl IntoCellValue for i64 {
    fn into_cell_value(self) -> String {
        self.to_string()
    }
}

impl IntoCellValue for f64 {
    fn into_cell_value(self) -> String {
        self.to_string()
    }
}

impl<T: IntoCellValue> IntoCellValue for Option<T> {
    fn into_cell_value(self) -> String {
        self.map(IntoCellValue::into_cell_value).unwrap_or_default()
    }
}

/// A single cell write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellUpdate {
    #[serde(rename = "rowId")]
    pub row_id: String,
    #[serde(rename = "columnId")]
    pub column_id: String,
    pub value: String,
}

impl CellUpdate {
    pub fn new(row_id: impl Into<String>, column_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            column_id: column_id.into(),
            value: value.into(),
        }
    }
}

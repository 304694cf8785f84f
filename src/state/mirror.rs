//! Column and row snapshot used both for the local mirror and for the last
//! known server state.

use crate::model::{Column, Row, TableData};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Ordered columns and rows of one table.
///
/// Invariant: every row has a cell entry for every column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableMirror {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl TableMirror {
    /// Builds a mirror from fetched data, filling in missing cells.
    pub fn from_data(data: &TableData) -> Self {
        let mut mirror = Self {
            columns: data.columns.clone(),
            rows: data.rows.clone(),
        };
        mirror.normalize();
        mirror
    }

    fn normalize(&mut self) {
        for row in &mut self.rows {
            for column in &self.columns {
                row.cells.entry(column.id.clone()).or_default();
            }
        }
    }

    // ===== Queries =====

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column_id)
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    /// Value of a cell, or `None` if the row or column does not exist.
    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&str> {
        self.column(column_id)?;
        self.row(row_id).map(|r| r.value(column_id))
    }

    pub fn next_row_order(&self) -> i64 {
        self.rows.iter().map(|r| r.order).max().map_or(0, |max| max + 1)
    }

    pub fn next_column_order(&self) -> i64 {
        self.columns.iter().map(|c| c.order).max().map_or(0, |max| max + 1)
    }

    // ===== Cell mutations =====

    /// Writes a cell, returning the previous value.
    ///
    /// Returns `None` without writing if the row or column does not exist.
    pub fn set_cell(&mut self, row_id: &str, column_id: &str, value: String) -> Option<String> {
        self.column(column_id)?;
        let row = self.rows.iter_mut().find(|r| r.id == row_id)?;
        Some(row.cells.insert(column_id.to_string(), value).unwrap_or_default())
    }

    // ===== Row mutations =====

    /// Appends a row, filling in missing cells.
    pub fn push_row(&mut self, mut row: Row) {
        for column in &self.columns {
            row.cells.entry(column.id.clone()).or_default();
        }
        self.rows.push(row);
    }

    /// Inserts a row at the position its `order` implies.
    pub fn insert_row_ordered(&mut self, mut row: Row) {
        for column in &self.columns {
            row.cells.entry(column.id.clone()).or_default();
        }
        let index = self
            .rows
            .iter()
            .position(|r| (r.order, r.created_at) > (row.order, row.created_at))
            .unwrap_or(self.rows.len());
        self.rows.insert(index, row);
    }

    pub fn remove_row(&mut self, row_id: &str) -> Option<Row> {
        let index = self.rows.iter().position(|r| r.id == row_id)?;
        Some(self.rows.remove(index))
    }

    /// Re-keys a row in place, keeping its cells and position.
    pub fn replace_row_id(&mut self, old_id: &str, new_id: &str, order: i64, created_at: DateTime<Utc>) -> bool {
        match self.rows.iter_mut().find(|r| r.id == old_id) {
            Some(row) => {
                row.id = new_id.to_string();
                row.order = order;
                row.created_at = created_at;
                true
            }
            None => false,
        }
    }

    // ===== Column mutations =====

    /// Appends a column with an empty value in every row.
    pub fn push_column(&mut self, column: Column) {
        let index = self.columns.len();
        self.insert_column_at(index, column, &BTreeMap::new());
    }

    /// Inserts a column at `index` (clamped), seeding cells from `values`
    /// keyed by row id; rows without a value get `""`.
    pub fn insert_column_at(&mut self, index: usize, column: Column, values: &BTreeMap<String, String>) {
        for row in &mut self.rows {
            let value = values.get(&row.id).cloned().unwrap_or_default();
            row.cells.insert(column.id.clone(), value);
        }
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
    }

    /// Removes a column and its cells, returning its former position.
    pub fn remove_column(&mut self, column_id: &str) -> Option<(usize, Column)> {
        let index = self.column_index(column_id)?;
        let column = self.columns.remove(index);
        for row in &mut self.rows {
            row.cells.remove(column_id);
        }
        Some((index, column))
    }

    /// Swaps a column definition in place and re-keys its cells.
    pub fn replace_column(&mut self, old_id: &str, column: Column) -> bool {
        let Some(index) = self.column_index(old_id) else {
            return false;
        };
        for row in &mut self.rows {
            let value = row.cells.remove(old_id).unwrap_or_default();
            row.cells.insert(column.id.clone(), value);
        }
        self.columns[index] = column;
        true
    }

    /// Renames a column, returning the previous name.
    pub fn rename_column(&mut self, column_id: &str, name: &str) -> Option<String> {
        let column = self.columns.iter_mut().find(|c| c.id == column_id)?;
        Some(std::mem::replace(&mut column.name, name.to_string()))
    }

    /// Values of one column keyed by row id.
    pub fn column_values(&self, column_id: &str) -> BTreeMap<String, String> {
        self.rows
            .iter()
            .filter_map(|r| r.cells.get(column_id).map(|v| (r.id.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, TableInfo};

    fn mirror() -> TableMirror {
        let columns = vec![
            Column::new("c1", "Name", ColumnType::Text, 1),
            Column::new("c2", "Age", ColumnType::Number, 2),
        ];
        let now = Utc::now();
        let mut sparse = Row::empty("r2", 2, now, &[]);
        sparse.cells.insert("c1".into(), "Bob".into());
        let data = TableData {
            table: TableInfo {
                id: "t1".into(),
                name: "Table 1".into(),
                base_id: "b1".into(),
            },
            rows: vec![Row::empty("r1", 1, now, &columns), sparse],
            columns,
        };
        TableMirror::from_data(&data)
    }

    #[test]
    fn test_missing_cells_normalize_to_empty() {
        let m = mirror();
        assert_eq!(m.cell("r2", "c2"), Some(""));
        assert_eq!(m.cell("r2", "c1"), Some("Bob"));
        assert_eq!(m.cell("r2", "nope"), None);
        assert_eq!(m.cell("nope", "c1"), None);
    }

    #[test]
    fn test_set_cell_returns_previous() {
        let mut m = mirror();
        assert_eq!(m.set_cell("r2", "c1", "Robert".into()), Some("Bob".into()));
        assert_eq!(m.set_cell("r9", "c1", "x".into()), None);
        assert_eq!(m.set_cell("r1", "c9", "x".into()), None);
    }

    #[test]
    fn test_replace_column_keeps_position_and_values() {
        let mut m = mirror();
        m.set_cell("r2", "c2", "41".into());
        let real = Column::new("c2-real", "Age", ColumnType::Number, 2);
        assert!(m.replace_column("c2", real));
        assert_eq!(m.column_index("c2-real"), Some(1));
        assert_eq!(m.cell("r2", "c2-real"), Some("41"));
        assert_eq!(m.cell("r2", "c2"), None);
    }

    #[test]
    fn test_remove_and_restore_column() {
        let mut m = mirror();
        let values = m.column_values("c1");
        let (index, column) = m.remove_column("c1").unwrap();
        assert!(m.rows().iter().all(|r| !r.cells.contains_key("c1")));

        m.insert_column_at(index, column, &values);
        assert_eq!(m.column_index("c1"), Some(0));
        assert_eq!(m.cell("r2", "c1"), Some("Bob"));
    }

    #[test]
    fn test_insert_row_ordered() {
        let mut m = mirror();
        let removed = m.remove_row("r1").unwrap();
        m.insert_row_ordered(removed);
        assert_eq!(m.rows()[0].id, "r1");
        assert_eq!(m.next_row_order(), 3);
    }
}

//! Projection of the mirror through a view configuration.

use crate::domain::filtering::matches_group;
use crate::domain::search::matches_search;
use crate::domain::sorting::sort_rows;
use crate::domain::visibility::visible_column_ids;
use crate::model::{Column, FilterGroup, Row, SortConfig, ViewConfig};
use serde::Serialize;

/// Rows that pass the search and the filters, in sort order.
///
/// Search looks at visible columns only; filters and sorts may reference
/// hidden ones. Pure: the inputs are not modified and equal inputs give equal
/// output.
pub fn evaluate<'a>(
    rows: &'a [Row],
    columns: &[Column],
    filters: &FilterGroup,
    sorts: &[SortConfig],
    hidden_columns: &[String],
    search_term: &str,
) -> Vec<&'a Row> {
    let searchable = visible_column_ids(columns, hidden_columns);
    let mut visible: Vec<&Row> = rows
        .iter()
        .filter(|row| matches_search(row, &searchable, search_term))
        .filter(|row| matches_group(row, filters))
        .collect();
    sort_rows(&mut visible, sorts);
    visible
}

/// Row and column ids in the order the grid shows them.
///
/// This is the ordering selection and keyboard navigation work over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibleGrid {
    pub row_ids: Vec<String>,
    pub column_ids: Vec<String>,
}

impl VisibleGrid {
    pub fn compute(rows: &[Row], columns: &[Column], config: &ViewConfig, search_term: &str) -> Self {
        let row_ids = evaluate(
            rows,
            columns,
            &config.filters,
            &config.sorts,
            &config.hidden_columns,
            search_term,
        )
        .into_iter()
        .map(|r| r.id.clone())
        .collect();
        Self {
            row_ids,
            column_ids: visible_column_ids(columns, &config.hidden_columns),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty() || self.column_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, Combinator, FilterCondition, FilterOperator, SortDirection};
    use chrono::Utc;

    fn fixture() -> (Vec<Column>, Vec<Row>) {
        let columns = vec![
            Column::new("name", "Name", ColumnType::Text, 1),
            Column::new("age", "Age", ColumnType::Number, 2),
        ];
        let now = Utc::now();
        let rows = [("r1", "carol", "35"), ("r2", "alice", "20"), ("r3", "bob", "41")]
            .iter()
            .enumerate()
            .map(|(i, (id, name, age))| {
                let mut row = Row::empty(*id, i as i64, now, &columns);
                row.cells.insert("name".into(), name.to_string());
                row.cells.insert("age".into(), age.to_string());
                row
            })
            .collect();
        (columns, rows)
    }

    fn adults() -> FilterGroup {
        FilterGroup {
            combinator: Combinator::And,
            conditions: vec![FilterCondition {
                id: "f1".into(),
                column_id: "age".into(),
                operator: FilterOperator::GreaterThan,
                value: "30".into(),
            }],
            ..FilterGroup::default()
        }
    }

    #[test]
    fn test_filter_then_sort() {
        let (columns, rows) = fixture();
        let sorts = [SortConfig::new("name", SortDirection::Asc)];
        let out = evaluate(&rows, &columns, &adults(), &sorts, &[], "");
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r3", "r1"]);
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let (columns, rows) = fixture();
        let sorts = [SortConfig::new("age", SortDirection::Desc)];
        let first = evaluate(&rows, &columns, &adults(), &sorts, &[], "o");
        let second = evaluate(&rows, &columns, &adults(), &sorts, &[], "o");
        assert_eq!(first, second);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_hidden_columns_still_filter_but_not_search() {
        let (columns, rows) = fixture();
        let hidden = ["age".to_string()];
        let out = evaluate(&rows, &columns, &adults(), &[], &hidden, "");
        assert_eq!(out.len(), 2);
        assert!(evaluate(&rows, &columns, &FilterGroup::default(), &[], &hidden, "41").is_empty());

        let config = ViewConfig {
            hidden_columns: hidden.to_vec(),
            ..ViewConfig::default()
        };
        let grid = VisibleGrid::compute(&rows, &columns, &config, "");
        assert_eq!(grid.column_ids, ["name"]);
        assert_eq!(grid.row_ids, ["r1", "r2", "r3"]);
    }
}

//! Column visibility.
//!
//! Hidden columns are a display concern only: they stay in the mirror and can
//! still be filtered and sorted on.

use crate::model::Column;

/// Columns not listed in `hidden`, in display order.
pub fn visible_columns<'a>(columns: &'a [Column], hidden: &[String]) -> Vec<&'a Column> {
    columns
        .iter()
        .filter(|c| !hidden.iter().any(|h| h == &c.id))
        .collect()
}

/// Ids of the visible columns.
pub fn visible_column_ids(columns: &[Column], hidden: &[String]) -> Vec<String> {
    visible_columns(columns, hidden)
        .into_iter()
        .map(|c| c.id.clone())
        .collect()
}

//! Multi-key row sorting.
//!
//! Rows compare by the string value of each sort key in turn. The sort is
//! stable, so rows that tie on every key keep their incoming order.

use crate::model::{Row, SortConfig, SortDirection};
use std::cmp::Ordering;

/// Sorts rows in place by `sorts`, the first entry having the highest priority.
///
/// # Arguments
/// * `rows` - The rows to order (usually the filtered set)
/// * `sorts` - Sort keys; an empty list leaves the order unchanged
pub fn sort_rows(rows: &mut [&Row], sorts: &[SortConfig]) {
    if sorts.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare_rows(a, b, sorts));
}

/// Compares two rows key by key. Missing cells compare as `""`.
pub fn compare_rows(a: &Row, b: &Row, sorts: &[SortConfig]) -> Ordering {
    for sort in sorts {
        let ordering = a.value(&sort.column_id).cmp(b.value(&sort.column_id));
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

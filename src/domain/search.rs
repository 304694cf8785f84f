//! Free-text row search.

use crate::model::Row;

/// True if `term` is empty or some cell among `column_ids` contains it,
/// ignoring case.
pub fn matches_search<S: AsRef<str>>(row: &Row, column_ids: &[S], term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    column_ids
        .iter()
        .any(|id| row.value(id.as_ref()).to_lowercase().contains(&needle))
}

/// True if a single cell value should be highlighted for `term`.
pub fn cell_matches(value: &str, term: &str) -> bool {
    let term = term.trim();
    !term.is_empty() && value.to_lowercase().contains(&term.to_lowercase())
}

//! Filter tree evaluation and operator metadata.
//!
//! Text operators compare case-insensitively. Numeric operators parse both
//! sides as `f64`; if either side does not parse, the condition does not
//! match, and that includes `not_equals`. Date operators compare calendar dates
//! parsed from ISO 8601 text, and unparseable dates do not match either.
//! `is_within` and operators this crate does not know match every row.

use crate::model::{ColumnType, Combinator, FilterCondition, FilterGroup, FilterOperator, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Display and applicability metadata for one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub label: &'static str,
    pub requires_value: bool,
    pub supported_types: &'static [ColumnType],
}

const TEXT: &[ColumnType] = &[ColumnType::Text];
const TEXT_SELECT: &[ColumnType] = &[ColumnType::Text, ColumnType::Select];
const PRESENCE: &[ColumnType] = &[ColumnType::Text, ColumnType::Number, ColumnType::Date];
const NUMERIC: &[ColumnType] = &[ColumnType::Number, ColumnType::Date];
const DATE: &[ColumnType] = &[ColumnType::Date];

/// Metadata for a known operator, `None` for [`FilterOperator::Unknown`].
pub fn operator_info(operator: &FilterOperator) -> Option<OperatorInfo> {
    let (label, requires_value, supported_types) = match operator {
        FilterOperator::Contains => ("contains", true, TEXT),
        FilterOperator::DoesNotContain => ("does not contain", true, TEXT),
        FilterOperator::Is => ("is", true, TEXT_SELECT),
        FilterOperator::IsNot => ("is not", true, TEXT_SELECT),
        FilterOperator::IsEmpty => ("is empty", false, PRESENCE),
        FilterOperator::IsNotEmpty => ("is not empty", false, PRESENCE),
        FilterOperator::StartsWith => ("starts with", true, TEXT),
        FilterOperator::EndsWith => ("ends with", true, TEXT),
        FilterOperator::Equals => ("equals", true, NUMERIC),
        FilterOperator::NotEquals => ("does not equal", true, NUMERIC),
        FilterOperator::GreaterThan => ("is greater than", true, NUMERIC),
        FilterOperator::LessThan => ("is less than", true, NUMERIC),
        FilterOperator::GreaterThanOrEqual => ("is greater than or equal to", true, NUMERIC),
        FilterOperator::LessThanOrEqual => ("is less than or equal to", true, NUMERIC),
        FilterOperator::IsBefore => ("is before", true, DATE),
        FilterOperator::IsAfter => ("is after", true, DATE),
        FilterOperator::IsOnOrBefore => ("is on or before", true, DATE),
        FilterOperator::IsOnOrAfter => ("is on or after", true, DATE),
        FilterOperator::IsWithin => ("is within", true, DATE),
        FilterOperator::IsExactly => ("is exactly", true, DATE),
        FilterOperator::Unknown(_) => return None,
    };
    Some(OperatorInfo {
        label,
        requires_value,
        supported_types,
    })
}

/// Operators offered for a column type, in menu order.
pub fn operators_for(column_type: ColumnType) -> Vec<FilterOperator> {
    FilterOperator::ALL
        .iter()
        .filter(|op| operator_info(op).is_some_and(|info| info.supported_types.contains(&column_type)))
        .cloned()
        .collect()
}

/// Evaluates a filter group against a row. An empty group matches.
pub fn matches_group(row: &Row, group: &FilterGroup) -> bool {
    if group.is_empty() {
        return true;
    }
    let mut results = group
        .conditions
        .iter()
        .map(|c| matches_condition(row, c))
        .chain(group.groups.iter().map(|g| matches_group(row, g)));

    match group.combinator {
        Combinator::And => results.all(|matched| matched),
        Combinator::Or => results.any(|matched| matched),
    }
}

pub fn matches_condition(row: &Row, condition: &FilterCondition) -> bool {
    let cell = row.value(&condition.column_id);
    let target = condition.value.as_str();

    match &condition.operator {
        FilterOperator::Contains => lower(cell).contains(&lower(target)),
        FilterOperator::DoesNotContain => !lower(cell).contains(&lower(target)),
        FilterOperator::StartsWith => lower(cell).starts_with(&lower(target)),
        FilterOperator::EndsWith => lower(cell).ends_with(&lower(target)),
        FilterOperator::Is => lower(cell) == lower(target),
        FilterOperator::IsNot => lower(cell) != lower(target),
        FilterOperator::IsEmpty => cell.is_empty(),
        FilterOperator::IsNotEmpty => !cell.is_empty(),

        FilterOperator::Equals => compare_numbers(cell, target, |o| o == Ordering::Equal),
        FilterOperator::NotEquals => compare_numbers(cell, target, |o| o != Ordering::Equal),
        FilterOperator::GreaterThan => compare_numbers(cell, target, |o| o == Ordering::Greater),
        FilterOperator::LessThan => compare_numbers(cell, target, |o| o == Ordering::Less),
        FilterOperator::GreaterThanOrEqual => compare_numbers(cell, target, |o| o != Ordering::Less),
        FilterOperator::LessThanOrEqual => compare_numbers(cell, target, |o| o != Ordering::Greater),

        FilterOperator::IsBefore => compare_dates(cell, target, |o| o == Ordering::Less),
        FilterOperator::IsAfter => compare_dates(cell, target, |o| o == Ordering::Greater),
        FilterOperator::IsOnOrBefore => compare_dates(cell, target, |o| o != Ordering::Greater),
        FilterOperator::IsOnOrAfter => compare_dates(cell, target, |o| o != Ordering::Less),
        FilterOperator::IsExactly => compare_dates(cell, target, |o| o == Ordering::Equal),

        FilterOperator::IsWithin | FilterOperator::Unknown(_) => true,
    }
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

fn compare_numbers(cell: &str, target: &str, accept: impl Fn(Ordering) -> bool) -> bool {
    let (Ok(a), Ok(b)) = (cell.trim().parse::<f64>(), target.trim().parse::<f64>()) else {
        return false;
    };
    a.partial_cmp(&b).is_some_and(accept)
}

fn compare_dates(cell: &str, target: &str, accept: impl Fn(Ordering) -> bool) -> bool {
    match (parse_date(cell), parse_date(target)) {
        (Some(a), Some(b)) => accept(a.cmp(&b)),
        _ => false,
    }
}

/// Parses `YYYY-MM-DD`, an RFC 3339 timestamp, or `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

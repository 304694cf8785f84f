//! Saved view configuration: filters, sorts and hidden columns.

use serde::{Deserialize, Serialize};

/// How the children of a filter group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Filter condition operator.
///
/// Operators this crate does not know are kept verbatim as `Unknown` so a
/// view written by a newer client survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Contains,
    DoesNotContain,
    Is,
    IsNot,
    IsEmpty,
    IsNotEmpty,
    StartsWith,
    EndsWith,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    IsBefore,
    IsAfter,
    IsOnOrBefore,
    IsOnOrAfter,
    IsWithin,
    IsExactly,
    Unknown(String),
}

impl FilterOperator {
    /// Every known operator, in menu order.
    pub const ALL: [FilterOperator; 20] = [
        FilterOperator::Contains,
        FilterOperator::DoesNotContain,
        FilterOperator::Is,
        FilterOperator::IsNot,
        FilterOperator::IsEmpty,
        FilterOperator::IsNotEmpty,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Equals,
        FilterOperator::NotEquals,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThanOrEqual,
        FilterOperator::IsBefore,
        FilterOperator::IsAfter,
        FilterOperator::IsOnOrBefore,
        FilterOperator::IsOnOrAfter,
        FilterOperator::IsWithin,
        FilterOperator::IsExactly,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::DoesNotContain => "does_not_contain",
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "is_not",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterThanOrEqual => "greater_than_or_equal",
            FilterOperator::LessThanOrEqual => "less_than_or_equal",
            FilterOperator::IsBefore => "is_before",
            FilterOperator::IsAfter => "is_after",
            FilterOperator::IsOnOrBefore => "is_on_or_before",
            FilterOperator::IsOnOrAfter => "is_on_or_after",
            FilterOperator::IsWithin => "is_within",
            FilterOperator::IsExactly => "is_exactly",
            FilterOperator::Unknown(name) => name,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(name: String) -> Self {
        FilterOperator::ALL
            .iter()
            .find(|op| op.as_str() == name)
            .cloned()
            .unwrap_or(FilterOperator::Unknown(name))
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

/// A single `column <operator> value` test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "columnId")]
    pub column_id: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: String,
}

/// Recursive group of conditions and nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    /// True when the group has nothing to test and therefore matches every row.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }

    /// Number of top-level conditions and groups.
    pub fn active_count(&self) -> usize {
        self.conditions.len() + self.groups.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(rename = "columnId")]
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
        }
    }
}

/// The projection inputs of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub filters: FilterGroup,
    #[serde(default)]
    pub sorts: Vec<SortConfig>,
    #[serde(rename = "hiddenColumns", default)]
    pub hidden_columns: Vec<String>,
}

/// A stored view. Each table has one default view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(rename = "tableId")]
    pub table_id: String,
    #[serde(rename = "isDefault")]
    pub is_default: bool,
    #[serde(flatten)]
    pub config: ViewConfig,
}

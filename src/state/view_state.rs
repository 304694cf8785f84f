//! Editable view configuration: filter tree, sort keys and hidden columns.
//!
//! All mutations are local. Persisting them is the view coordinator's job.

use crate::domain::filtering::{operator_info, operators_for};
use crate::model::{
    Column, Combinator, FilterCondition, FilterGroup, FilterOperator, SortConfig, SortDirection, ViewConfig,
};
use uuid::Uuid;

/// Partial update of a filter condition. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionPatch {
    pub column_id: Option<String>,
    pub operator: Option<FilterOperator>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    config: ViewConfig,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ViewConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ViewConfig) {
        self.config = config;
    }

    pub fn filters(&self) -> &FilterGroup {
        &self.config.filters
    }

    pub fn sorts(&self) -> &[SortConfig] {
        &self.config.sorts
    }

    pub fn hidden_columns(&self) -> &[String] {
        &self.config.hidden_columns
    }

    pub fn is_hidden(&self, column_id: &str) -> bool {
        self.config.hidden_columns.iter().any(|c| c == column_id)
    }

    // ===== Filters =====

    /// Sets how a group's children combine. `None` addresses the root group.
    pub fn set_combinator(&mut self, group_id: Option<&str>, combinator: Combinator) -> bool {
        match find_group_mut(&mut self.config.filters, group_id) {
            Some(group) => {
                group.combinator = combinator;
                true
            }
            None => false,
        }
    }

    /// Appends a condition to a group and returns its id.
    pub fn add_condition(
        &mut self,
        group_id: Option<&str>,
        column_id: &str,
        operator: FilterOperator,
        value: &str,
    ) -> Option<String> {
        let group = find_group_mut(&mut self.config.filters, group_id)?;
        let id = Uuid::new_v4().to_string();
        group.conditions.push(FilterCondition {
            id: id.clone(),
            column_id: column_id.to_string(),
            operator,
            value: value.to_string(),
        });
        Some(id)
    }

    /// Appends a condition on the first column with that column's first
    /// supported operator.
    pub fn add_default_condition(&mut self, group_id: Option<&str>, columns: &[Column]) -> Option<String> {
        let column = columns.first()?;
        let operator = operators_for(column.column_type)
            .into_iter()
            .next()
            .unwrap_or(FilterOperator::Contains);
        self.add_condition(group_id, &column.id, operator, "")
    }

    /// Applies a patch to a condition wherever it sits in the filter tree.
    ///
    /// Switching to a column whose type does not support the current
    /// operator also switches to that type's first operator. Operators that
    /// take no value clear it.
    pub fn update_condition(&mut self, condition_id: &str, patch: ConditionPatch, columns: &[Column]) -> bool {
        let Some(condition) = find_condition_mut(&mut self.config.filters, condition_id) else {
            return false;
        };
        if let Some(column_id) = patch.column_id {
            if let Some(column) = columns.iter().find(|c| c.id == column_id) {
                let supported = operators_for(column.column_type);
                if !supported.is_empty() && !supported.contains(&condition.operator) {
                    condition.operator = supported[0].clone();
                }
            }
            condition.column_id = column_id;
        }
        if let Some(operator) = patch.operator {
            condition.operator = operator;
        }
        if let Some(value) = patch.value {
            condition.value = value;
        }
        if operator_info(&condition.operator).is_some_and(|info| !info.requires_value) {
            condition.value.clear();
        }
        true
    }

    pub fn remove_condition(&mut self, condition_id: &str) -> bool {
        remove_condition_from(&mut self.config.filters, condition_id)
    }

    /// Adds an empty nested group under `parent_id` and returns its id.
    pub fn add_group(&mut self, parent_id: Option<&str>, combinator: Combinator) -> Option<String> {
        let parent = find_group_mut(&mut self.config.filters, parent_id)?;
        let id = Uuid::new_v4().to_string();
        parent.groups.push(FilterGroup {
            id: id.clone(),
            combinator,
            conditions: Vec::new(),
            groups: Vec::new(),
        });
        Some(id)
    }

    pub fn remove_group(&mut self, group_id: &str) -> bool {
        remove_group_from(&mut self.config.filters, group_id)
    }

    pub fn clear_filters(&mut self) {
        let id = std::mem::take(&mut self.config.filters.id);
        self.config.filters = FilterGroup {
            id,
            ..FilterGroup::default()
        };
    }

    // ===== Sorts =====

    /// Adds an ascending sort on the first column not already sorted.
    /// Returns false when every column is already a sort key.
    pub fn add_sort(&mut self, columns: &[Column]) -> bool {
        let unused = columns
            .iter()
            .find(|c| !self.config.sorts.iter().any(|s| s.column_id == c.id));
        match unused {
            Some(column) => {
                self.config.sorts.push(SortConfig::new(column.id.as_str(), SortDirection::Asc));
                true
            }
            None => false,
        }
    }

    pub fn update_sort(&mut self, index: usize, column_id: Option<&str>, direction: Option<SortDirection>) -> bool {
        let Some(sort) = self.config.sorts.get_mut(index) else {
            return false;
        };
        if let Some(column_id) = column_id {
            sort.column_id = column_id.to_string();
        }
        if let Some(direction) = direction {
            sort.direction = direction;
        }
        true
    }

    pub fn remove_sort(&mut self, index: usize) -> bool {
        if index < self.config.sorts.len() {
            self.config.sorts.remove(index);
            true
        } else {
            false
        }
    }

    /// Moves a sort key to a new priority position.
    pub fn move_sort(&mut self, from: usize, to: usize) -> bool {
        let len = self.config.sorts.len();
        if from >= len || to >= len {
            return false;
        }
        let sort = self.config.sorts.remove(from);
        self.config.sorts.insert(to, sort);
        true
    }

    pub fn set_sorts(&mut self, sorts: Vec<SortConfig>) {
        self.config.sorts = sorts;
    }

    pub fn clear_sorts(&mut self) {
        self.config.sorts.clear();
    }

    // ===== Column visibility =====

    /// Hides a visible column or shows a hidden one.
    pub fn toggle_column(&mut self, column_id: &str) {
        if self.is_hidden(column_id) {
            self.config.hidden_columns.retain(|c| c != column_id);
        } else {
            self.config.hidden_columns.push(column_id.to_string());
        }
    }

    pub fn show_all(&mut self) {
        self.config.hidden_columns.clear();
    }

    pub fn hide_all_except_first(&mut self, columns: &[Column]) {
        self.config.hidden_columns = columns.iter().skip(1).map(|c| c.id.clone()).collect();
    }

    // ===== Id maintenance =====

    /// Points conditions, sorts and hidden entries at a column's confirmed id.
    pub fn remap_column(&mut self, old_id: &str, new_id: &str) {
        for_each_condition_mut(&mut self.config.filters, &mut |c| {
            if c.column_id == old_id {
                c.column_id = new_id.to_string();
            }
        });
        for sort in &mut self.config.sorts {
            if sort.column_id == old_id {
                sort.column_id = new_id.to_string();
            }
        }
        for hidden in &mut self.config.hidden_columns {
            if hidden == old_id {
                *hidden = new_id.to_string();
            }
        }
    }
}

fn find_group_mut<'a>(root: &'a mut FilterGroup, group_id: Option<&str>) -> Option<&'a mut FilterGroup> {
    let Some(id) = group_id else {
        return Some(root);
    };
    if root.id == id {
        return Some(root);
    }
    root.groups.iter_mut().find_map(|g| find_group_mut(g, Some(id)))
}

fn find_condition_mut<'a>(group: &'a mut FilterGroup, condition_id: &str) -> Option<&'a mut FilterCondition> {
    if let Some(index) = group.conditions.iter().position(|c| c.id == condition_id) {
        return group.conditions.get_mut(index);
    }
    group.groups.iter_mut().find_map(|g| find_condition_mut(g, condition_id))
}

fn remove_condition_from(group: &mut FilterGroup, condition_id: &str) -> bool {
    let before = group.conditions.len();
    group.conditions.retain(|c| c.id != condition_id);
    if group.conditions.len() != before {
        return true;
    }
    group.groups.iter_mut().any(|g| remove_condition_from(g, condition_id))
}

fn remove_group_from(group: &mut FilterGroup, group_id: &str) -> bool {
    let before = group.groups.len();
    group.groups.retain(|g| g.id != group_id);
    if group.groups.len() != before {
        return true;
    }
    group.groups.iter_mut().any(|g| remove_group_from(g, group_id))
}

fn for_each_condition_mut(group: &mut FilterGroup, f: &mut impl FnMut(&mut FilterCondition)) {
    for condition in &mut group.conditions {
        f(condition);
    }
    for nested in &mut group.groups {
        for_each_condition_mut(nested, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", "Name", ColumnType::Text, 1),
            Column::new("age", "Age", ColumnType::Number, 2),
            Column::new("born", "Born", ColumnType::Date, 3),
        ]
    }

    #[test]
    fn test_nested_condition_edit_and_remove() {
        let mut view = ViewState::new();
        let group = view.add_group(None, Combinator::Or).unwrap();
        let id = view
            .add_condition(Some(&group), "name", FilterOperator::Contains, "al")
            .unwrap();

        let patch = ConditionPatch {
            value: Some("bo".into()),
            ..ConditionPatch::default()
        };
        assert!(view.update_condition(&id, patch, &columns()));
        assert_eq!(view.filters().groups[0].conditions[0].value, "bo");

        assert!(view.remove_condition(&id));
        assert!(view.filters().groups[0].conditions.is_empty());
        assert!(!view.remove_condition(&id));
    }

    #[test]
    fn test_column_switch_picks_supported_operator() {
        let mut view = ViewState::new();
        let id = view.add_default_condition(None, &columns()).unwrap();
        assert_eq!(view.filters().conditions[0].operator, FilterOperator::Contains);

        let patch = ConditionPatch {
            column_id: Some("age".into()),
            ..ConditionPatch::default()
        };
        view.update_condition(&id, patch, &columns());
        let condition = &view.filters().conditions[0];
        assert_eq!(condition.column_id, "age");
        assert!(operators_for(ColumnType::Number).contains(&condition.operator));
    }

    #[test]
    fn test_valueless_operator_clears_value() {
        let mut view = ViewState::new();
        let id = view.add_condition(None, "name", FilterOperator::Is, "x").unwrap();
        let patch = ConditionPatch {
            operator: Some(FilterOperator::IsEmpty),
            ..ConditionPatch::default()
        };
        view.update_condition(&id, patch, &columns());
        assert_eq!(view.filters().conditions[0].value, "");
    }

    #[test]
    fn test_add_sort_uses_unsorted_columns() {
        let cols = columns();
        let mut view = ViewState::new();
        assert!(view.add_sort(&cols));
        assert!(view.add_sort(&cols));
        assert!(view.add_sort(&cols));
        assert!(!view.add_sort(&cols));
        assert_eq!(view.sorts()[1].column_id, "age");

        assert!(view.move_sort(2, 0));
        assert_eq!(view.sorts()[0].column_id, "born");
        assert!(view.remove_sort(0));
        assert_eq!(view.sorts().len(), 2);
    }

    #[test]
    fn test_visibility_toggles() {
        let cols = columns();
        let mut view = ViewState::new();
        view.toggle_column("age");
        assert!(view.is_hidden("age"));
        view.toggle_column("age");
        assert!(!view.is_hidden("age"));

        view.hide_all_except_first(&cols);
        assert_eq!(view.hidden_columns(), ["age".to_string(), "born".to_string()]);
        view.show_all();
        assert!(view.hidden_columns().is_empty());
    }

    #[test]
    fn test_clear_filters_keeps_root_id() {
        let mut view = ViewState::from_config(ViewConfig {
            filters: FilterGroup {
                id: "root".into(),
                ..FilterGroup::default()
            },
            ..ViewConfig::default()
        });
        view.add_condition(Some("root"), "name", FilterOperator::Contains, "a");
        view.clear_filters();
        assert!(view.filters().is_empty());
        assert_eq!(view.filters().id, "root");
    }
}

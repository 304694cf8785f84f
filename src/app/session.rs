//! Editing session for one base.
//!
//! `TableSession` is the single entry point a grid front end talks to. It
//! owns the operations engine, the view coordinator and the interaction state
//! (history, selection, focus, search), and keeps the interaction state in
//! step with the mirror as temporary ids are confirmed or rows and columns go
//! away.

use crate::app::mutations::Reconciled;
use crate::app::operations::TableOperations;
use crate::app::view_coordinator::{ViewCoordinator, ViewEvent};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::domain::navigation::{self, Direction};
use crate::domain::view::{evaluate, VisibleGrid};
use crate::keys::CellKey;
use crate::model::{Column, IntoCellValue, Row, TableData, ViewConfig};
use crate::remote::RemoteStore;
use crate::state::{FocusState, History, SelectionState, ViewState};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// Something that changed while polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SessionEvent {
    Table(Reconciled),
    View(ViewEvent),
}

// ===== Keyboard input =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Tab,
    Escape,
    Delete,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self { ctrl: true, ..Self::new(key) }
    }

    pub fn shift(key: Key) -> Self {
        Self { shift: true, ..Self::new(key) }
    }

    pub fn ctrl_shift(key: Key) -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::new(key)
        }
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

fn arrow(key: Key) -> Option<Direction> {
    match key {
        Key::Up => Some(Direction::Up),
        Key::Down => Some(Direction::Down),
        Key::Left => Some(Direction::Left),
        Key::Right => Some(Direction::Right),
        _ => None,
    }
}

// ===== Session =====

pub struct TableSession {
    ops: TableOperations,
    views: ViewCoordinator,
    history: History,
    selection: SelectionState,
    focus: FocusState,
    search: String,
}

impl TableSession {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: EngineConfig, base_id: &str) -> Self {
        let history = History::new(config.history_limit);
        Self {
            views: ViewCoordinator::new(Arc::clone(&store), base_id),
            ops: TableOperations::new(store, clock, config, base_id),
            history,
            selection: SelectionState::new(),
            focus: FocusState::new(),
            search: String::new(),
        }
    }

    // ===== Table lifecycle =====

    /// Starts loading a table (the base's first for `None`). The view is
    /// fetched once the table has loaded.
    pub fn open(&mut self, table_id: Option<&str>) {
        self.ops.open(table_id);
        self.views.reset();
        self.reset_interaction();
    }

    pub fn switch_table(&mut self, table_id: &str) {
        self.open(Some(table_id));
    }

    /// Activates already fetched table data and requests its view.
    pub fn load(&mut self, data: TableData) {
        let table_id = data.table.id.clone();
        self.ops.load(data);
        self.reset_interaction();
        self.views.load(&table_id);
    }

    fn reset_interaction(&mut self) {
        self.history.clear();
        self.selection.clear_selection();
        self.focus.clear();
        self.search.clear();
    }

    /// Runs the engine's event loop once and brings the interaction state up
    /// to date with what it reports.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.ops.poll() {
            self.apply(&event);
            events.push(SessionEvent::Table(event));
        }
        events.extend(self.views.poll().into_iter().map(SessionEvent::View));
        events
    }

    fn apply(&mut self, event: &Reconciled) {
        match event {
            Reconciled::TableLoaded { table_id } => {
                self.reset_interaction();
                self.views.load(table_id);
            }
            Reconciled::RowConfirmed { temp_id, row_id } => {
                self.history.remap_row(temp_id, row_id);
                self.selection.remap_row(temp_id, row_id);
                self.focus.remap_row(temp_id, row_id);
            }
            Reconciled::RowRemoved { row_id } => {
                self.selection.forget_row(row_id);
                self.focus.forget_row(row_id);
            }
            Reconciled::ColumnConfirmed { temp_id, column_id } => {
                self.history.remap_column(temp_id, column_id);
                self.selection.remap_column(temp_id, column_id);
                self.focus.remap_column(temp_id, column_id);
                self.views.edit(|view| view.remap_column(temp_id, column_id));
            }
            Reconciled::ColumnRemoved { column_id } => {
                self.selection.forget_column(column_id);
                self.focus.forget_column(column_id);
            }
            Reconciled::TableLoadFailed { .. }
            | Reconciled::RowRestored { .. }
            | Reconciled::ColumnRestored { .. }
            | Reconciled::ColumnNameReverted { .. }
            | Reconciled::CellReverted { .. } => {}
        }
    }

    /// Sends all debounced writes now.
    pub fn flush(&mut self) {
        self.ops.flush();
    }

    // ===== Accessors =====

    pub fn operations(&self) -> &TableOperations {
        &self.ops
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn view(&self) -> &ViewCoordinator {
        &self.views
    }

    pub fn view_config(&self) -> &ViewConfig {
        self.views.config()
    }

    pub fn columns(&self) -> &[Column] {
        self.ops.columns()
    }

    pub fn rows(&self) -> &[Row] {
        self.ops.rows()
    }

    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&str> {
        self.ops.cell(row_id, column_id)
    }

    // ===== Cells, rows, columns =====

    /// A user edit: applied to the mirror, sent, and recorded for undo.
    pub fn update_cell(&mut self, row_id: &str, column_id: &str, value: impl IntoCellValue) {
        self.ops.update_data(row_id, column_id, value, Some(&mut self.history));
    }

    pub fn add_row(&mut self) -> Option<String> {
        self.ops.add_row()
    }

    pub fn delete_row(&mut self, row_id: &str) -> bool {
        if !self.ops.delete_row(row_id) {
            return false;
        }
        self.selection.forget_row(row_id);
        self.focus.forget_row(row_id);
        true
    }

    pub fn add_column(&mut self) -> Option<String> {
        self.ops.add_column()
    }

    pub fn delete_column(&mut self, column_id: &str) -> bool {
        if !self.ops.delete_column(column_id) {
            return false;
        }
        self.selection.forget_column(column_id);
        self.focus.forget_column(column_id);
        true
    }

    pub fn update_column_name(&mut self, column_id: &str, name: &str) -> bool {
        self.ops.update_column_name(column_id, name)
    }

    // ===== Undo / redo =====

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.ops)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.ops)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ===== Selection =====

    pub fn start_selection(&mut self, row_id: &str, column_id: &str) {
        self.selection.start_selection(row_id, column_id);
    }

    /// Extends the drag selection over the rows and columns currently shown.
    pub fn update_selection(&mut self, row_id: &str, column_id: &str) {
        let grid = self.visible_grid();
        self.selection
            .update_selection(row_id, column_id, &grid.row_ids, &grid.column_ids);
    }

    pub fn end_selection(&mut self) {
        self.selection.end_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    /// Clears every selected cell as one undoable step.
    pub fn delete_selected_cells(&mut self) -> usize {
        self.selection
            .delete_selected_cells(&mut self.ops, Some(&mut self.history))
    }

    // ===== Search and projection =====

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
    }

    /// Rows as the grid shows them.
    pub fn visible_rows(&self) -> Vec<&Row> {
        let config = self.views.config();
        evaluate(
            self.ops.rows(),
            self.ops.columns(),
            &config.filters,
            &config.sorts,
            &config.hidden_columns,
            &self.search,
        )
    }

    pub fn visible_grid(&self) -> VisibleGrid {
        VisibleGrid::compute(self.ops.rows(), self.ops.columns(), self.views.config(), &self.search)
    }

    /// Edits the view configuration and persists the change.
    pub fn edit_view<R>(&mut self, edit: impl FnOnce(&mut ViewState, &[Column]) -> R) -> R {
        let columns = self.ops.columns();
        self.views.edit(|view| edit(view, columns))
    }

    // ===== Focus and editing =====

    pub fn focus_cell(&mut self, row_id: &str, column_id: &str) {
        self.focus.focus(CellKey::new(row_id, column_id));
    }

    pub fn clear_focus(&mut self) {
        self.focus.clear_focus();
    }

    pub fn select_column(&mut self, column_id: Option<&str>) {
        self.focus.select_column(column_id);
    }

    /// Starts editing a cell with its current value as the draft.
    pub fn start_editing(&mut self, row_id: &str, column_id: &str) -> bool {
        let Some(value) = self.ops.cell(row_id, column_id).map(str::to_string) else {
            return false;
        };
        self.focus.start_editing(CellKey::new(row_id, column_id), &value);
        true
    }

    pub fn set_draft(&mut self, text: &str) {
        self.focus.set_draft(text);
    }

    /// Ends editing and writes the draft if it differs from the cell.
    pub fn commit_edit(&mut self) -> bool {
        let Some((key, draft)) = self.focus.finish_editing() else {
            return false;
        };
        if self.ops.cell(&key.row_id, &key.column_id) == Some(draft.as_str()) {
            return false;
        }
        self.update_cell(&key.row_id, &key.column_id, draft);
        true
    }

    pub fn cancel_edit(&mut self) {
        self.focus.cancel_editing();
    }

    /// Handles one key press. Returns false if the key was not used.
    pub fn handle_key(&mut self, input: impl Into<KeyInput>) -> bool {
        let input = input.into();
        if self.focus.is_editing() {
            self.handle_editing_key(input)
        } else {
            self.handle_grid_key(input)
        }
    }

    fn handle_editing_key(&mut self, input: KeyInput) -> bool {
        let Some(editing) = self.focus.editing().cloned() else {
            return false;
        };
        match input.key {
            Key::Enter if input.shift => {
                self.commit_edit();
                self.selection.clear_selection();
                self.focus.select_column(None);
                if let Some(row_id) = self.add_row() {
                    self.focus.start_editing(CellKey::new(row_id, editing.column_id), "");
                }
                true
            }
            Key::Enter => {
                self.commit_edit();
                let grid = self.visible_grid();
                if let Some(next) = navigation::step(&editing, Direction::Down, &grid.row_ids, &grid.column_ids) {
                    if next != editing {
                        self.start_editing(&next.row_id, &next.column_id);
                    }
                }
                true
            }
            Key::Tab => {
                self.commit_edit();
                let direction = if input.shift { Direction::Left } else { Direction::Right };
                let grid = self.visible_grid();
                if let Some(next) = navigation::step(&editing, direction, &grid.row_ids, &grid.column_ids) {
                    self.focus.focus(next);
                }
                true
            }
            Key::Escape => {
                self.focus.cancel_editing();
                true
            }
            Key::Backspace => {
                let mut draft = self.focus.draft().to_string();
                draft.pop();
                self.focus.set_draft(&draft);
                true
            }
            Key::Char(c) if !input.ctrl => {
                let mut draft = self.focus.draft().to_string();
                draft.push(c);
                self.focus.set_draft(&draft);
                true
            }
            _ => false,
        }
    }

    fn handle_grid_key(&mut self, input: KeyInput) -> bool {
        if input.ctrl {
            return match input.key {
                Key::Char('z') | Key::Char('Z') if input.shift => self.redo(),
                Key::Char('z') | Key::Char('Z') => self.undo(),
                Key::Char('y') | Key::Char('Y') => self.redo(),
                _ => false,
            };
        }

        if let Some(direction) = arrow(input.key) {
            return self.move_focus(direction);
        }

        match input.key {
            Key::Delete | Key::Backspace => {
                if !self.selection.is_empty() {
                    self.delete_selected_cells();
                } else if let Some(key) = self.focus.focused().cloned() {
                    self.update_cell(&key.row_id, &key.column_id, "");
                } else {
                    self.focus_first_cell();
                }
                true
            }
            Key::Tab => self.move_focus(if input.shift { Direction::Left } else { Direction::Right }),
            Key::Enter => {
                let Some(key) = self.focus.focused().cloned() else {
                    return self.focus_first_cell();
                };
                self.selection.clear_selection();
                self.focus.select_column(None);
                self.start_editing(&key.row_id, &key.column_id)
            }
            Key::Escape => {
                self.selection.clear_selection();
                true
            }
            Key::Char(c) => {
                let Some(key) = self.focus.focused().cloned() else {
                    return false;
                };
                if self.ops.cell(&key.row_id, &key.column_id).is_none() {
                    return false;
                }
                self.selection.clear_selection();
                self.focus.start_editing(key, &c.to_string());
                true
            }
            _ => false,
        }
    }

    fn move_focus(&mut self, direction: Direction) -> bool {
        let grid = self.visible_grid();
        let next = match self.focus.focused() {
            Some(from) => navigation::step(from, direction, &grid.row_ids, &grid.column_ids),
            None => None,
        };
        match next.or_else(|| navigation::first_cell(&grid.row_ids, &grid.column_ids)) {
            Some(key) => {
                debug!("focus moves to {}", key);
                self.focus.focus(key);
                true
            }
            None => false,
        }
    }

    fn focus_first_cell(&mut self) -> bool {
        let grid = self.visible_grid();
        match navigation::first_cell(&grid.row_ids, &grid.column_ids) {
            Some(key) => {
                self.focus.focus(key);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::memory::{InMemoryStore, Operation, Resolution};

    fn session(resolution: Resolution) -> (InMemoryStore, ManualClock, TableSession) {
        let store = InMemoryStore::new();
        let base = store.create_base("Base");
        store.seed_table(&base, &["Name", "Age"], 3).unwrap();
        let clock = ManualClock::new();
        let mut session = TableSession::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            EngineConfig::default(),
            &base,
        );
        session.open(None);
        session.poll();
        store.set_resolution(resolution);
        (store, clock, session)
    }

    fn ids(session: &TableSession) -> (Vec<String>, Vec<String>) {
        let grid = session.visible_grid();
        (grid.row_ids, grid.column_ids)
    }

    #[test]
    fn test_open_loads_table_and_view() {
        let (_, _, session) = session(Resolution::Immediate);
        assert_eq!(session.rows().len(), 3);
        assert!(session.view().view_id().is_some());
    }

    #[test]
    fn test_first_arrow_focuses_first_cell_then_steps() {
        let (_, _, mut s) = session(Resolution::Immediate);
        let (rows, cols) = ids(&s);
        assert!(s.handle_key(Key::Down));
        assert_eq!(s.focus().focused(), Some(&CellKey::new(rows[0].as_str(), cols[0].as_str())));
        s.handle_key(Key::Down);
        s.handle_key(Key::Right);
        s.handle_key(Key::Right);
        assert_eq!(s.focus().focused(), Some(&CellKey::new(rows[1].as_str(), cols[1].as_str())));
    }

    #[test]
    fn test_typing_edits_and_enter_commits_then_moves_down() {
        let (_, _, mut s) = session(Resolution::Immediate);
        let (rows, cols) = ids(&s);
        s.focus_cell(&rows[0], &cols[0]);
        s.handle_key(Key::Char('h'));
        s.handle_key(Key::Char('i'));
        assert_eq!(s.focus().draft(), "hi");
        s.handle_key(Key::Enter);
        assert_eq!(s.cell(&rows[0], &cols[0]), Some("hi"));
        assert_eq!(s.focus().editing(), Some(&CellKey::new(rows[1].as_str(), cols[0].as_str())));
        assert!(s.can_undo());
    }

    #[test]
    fn test_escape_cancels_edit() {
        let (_, _, mut s) = session(Resolution::Immediate);
        let (rows, cols) = ids(&s);
        let before = s.cell(&rows[0], &cols[0]).map(str::to_string);
        s.focus_cell(&rows[0], &cols[0]);
        s.handle_key(Key::Enter);
        s.set_draft("changed");
        s.handle_key(Key::Escape);
        assert!(!s.focus().is_editing());
        assert_eq!(s.cell(&rows[0], &cols[0]).map(str::to_string), before);
    }

    #[test]
    fn test_delete_key_clears_selection_as_one_undo_step() {
        let (_, _, mut s) = session(Resolution::Immediate);
        let (rows, cols) = ids(&s);
        s.update_cell(&rows[0], &cols[0], "a");
        s.update_cell(&rows[1], &cols[1], "b");
        s.start_selection(&rows[0], &cols[0]);
        s.update_selection(&rows[1], &cols[1]);
        s.end_selection();
        assert_eq!(s.selection().len(), 4);

        assert!(s.handle_key(Key::Delete));
        assert_eq!(s.cell(&rows[0], &cols[0]), Some(""));
        assert_eq!(s.cell(&rows[1], &cols[1]), Some(""));
        assert!(s.selection().is_empty());

        assert!(s.handle_key(KeyInput::ctrl(Key::Char('z'))));
        assert_eq!(s.cell(&rows[0], &cols[0]), Some("a"));
        assert_eq!(s.cell(&rows[1], &cols[1]), Some("b"));
        assert!(s.handle_key(KeyInput::ctrl_shift(Key::Char('z'))));
        assert_eq!(s.cell(&rows[0], &cols[0]), Some(""));
    }

    #[test]
    fn test_shift_enter_adds_row_and_edits_it() {
        let (store, _, mut s) = session(Resolution::Manual);
        let (rows, cols) = ids(&s);
        s.start_editing(&rows[2], &cols[1]);
        assert!(s.handle_key(KeyInput::shift(Key::Enter)));
        assert_eq!(s.rows().len(), 4);
        let editing = s.focus().editing().cloned().unwrap();
        assert!(crate::keys::is_temp_row_id(&editing.row_id));
        assert_eq!(editing.column_id, cols[1]);

        s.set_draft("new");
        s.commit_edit();
        store.resolve_all();
        let events = s.poll();
        let confirmed = events.iter().find_map(|e| match e {
            SessionEvent::Table(Reconciled::RowConfirmed { row_id, .. }) => Some(row_id.clone()),
            _ => None,
        });
        let row_id = confirmed.unwrap();
        assert_eq!(s.cell(&row_id, &cols[1]), Some("new"));
        assert_eq!(s.history().entries().last().unwrap().changes[0].row_id, row_id);
        assert_eq!(store.call_count(Operation::UpdateCell), 1);
    }

    #[test]
    fn test_search_narrows_visible_rows() {
        let (_, _, mut s) = session(Resolution::Immediate);
        let (rows, cols) = ids(&s);
        s.update_cell(&rows[1], &cols[0], "needle");
        s.set_search("NEED");
        let visible: Vec<&str> = s.visible_rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(visible, [rows[1].as_str()]);
    }

    #[test]
    fn test_hidden_columns_leave_navigation() {
        let (store, _, mut s) = session(Resolution::Immediate);
        let (_, cols) = ids(&s);
        s.edit_view(|view, _| view.toggle_column(&cols[0]));
        assert_eq!(store.call_count(Operation::UpdateView), 1);
        s.handle_key(Key::Right);
        assert_eq!(s.focus().focused().unwrap().column_id, cols[1]);
    }

    #[test]
    fn test_confirmed_column_is_remapped_in_view() {
        let (store, _, mut s) = session(Resolution::Manual);
        let temp = s.add_column().unwrap();
        s.edit_view(|view, _| view.toggle_column(&temp));
        store.resolve_first(Operation::AddColumn);
        let events = s.poll();
        let real = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::Table(Reconciled::ColumnConfirmed { column_id, .. }) => Some(column_id.clone()),
                _ => None,
            })
            .unwrap();
        assert!(s.view().state().is_hidden(&real));
        assert!(!s.view().state().is_hidden(&temp));
    }
}

use anyhow::{Context, Result};
use gridsync::domain::view::evaluate;
use gridsync::keys::is_temp_row_id;
use gridsync::{
    Column, Combinator, EngineConfig, FilterCondition, FilterGroup, FilterOperator, InMemoryStore, ManualClock,
    Operation, Reconciled, RemoteError, Resolution, Row, SessionEvent, SortConfig, SortDirection, TableData,
    TableSession,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

struct Harness {
    store: InMemoryStore,
    clock: ManualClock,
    session: TableSession,
    data: TableData,
}

fn harness(columns: &[&str], rows: usize) -> Result<Harness> {
    let store = InMemoryStore::new();
    let base = store.create_base("Base");
    let data = store.seed_table(&base, columns, rows).context("seeding")?;
    let clock = ManualClock::new();
    let mut session = TableSession::new(
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        EngineConfig::default(),
        &base,
    );
    session.open(Some(&data.table.id));
    session.poll();
    Ok(Harness {
        store,
        clock,
        session,
        data,
    })
}

impl Harness {
    fn row(&self, i: usize) -> String {
        self.data.rows[i].id.clone()
    }

    fn col(&self, i: usize) -> String {
        self.data.columns[i].id.clone()
    }

    /// Moves past the debounce window and applies whatever resolved.
    fn settle(&mut self) -> Vec<SessionEvent> {
        self.clock.advance_ms(300);
        self.store.resolve_all();
        let mut events = self.session.poll();
        self.store.resolve_all();
        events.extend(self.session.poll());
        events
    }
}

fn column_ids(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.id.clone()).collect()
}

#[test]
fn test_rapid_edits_coalesce_into_one_write() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    let (row, col) = (h.row(0), h.col(0));
    for value in ["A", "Al", "Ali", "Alic", "Alice"] {
        h.session.update_cell(&row, &col, value);
        h.clock.advance_ms(50);
        h.session.poll();
    }
    assert_eq!(h.store.call_count(Operation::UpdateCell), 0);

    h.clock.advance_ms(300);
    h.session.poll();
    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].value, "Alice");
    Ok(())
}

#[test]
fn test_clearing_a_cell_is_sent_immediately() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    let (row, col) = (h.row(0), h.col(0));
    h.session.update_cell(&row, &col, "draft");
    h.session.update_cell(&row, &col, "");

    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].value, "");

    h.clock.advance_ms(1000);
    h.session.poll();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 1);
    assert_eq!(h.session.cell(&row, &col), Some(""));
    Ok(())
}

#[test]
fn test_temp_row_edits_are_sent_against_the_real_id() -> Result<()> {
    let mut h = harness(&["Name", "Age"], 1)?;
    h.store.set_resolution(Resolution::Manual);
    let temp = h.session.add_row().context("no table")?;
    assert!(is_temp_row_id(&temp));
    h.session.update_cell(&temp, &h.col(0), "x");
    h.clock.advance_ms(500);
    h.session.poll();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 0);

    let events = h.settle();
    let real = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::Table(Reconciled::RowConfirmed { row_id, .. }) => Some(row_id.clone()),
            _ => None,
        })
        .context("row was not confirmed")?;

    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].row_id, real);
    assert_eq!(updates[0].value, "x");
    assert!(updates.iter().all(|u| u.row_id != temp));
    assert_eq!(h.store.cell_value(&real, &h.col(0)).as_deref(), Some("x"));
    assert_eq!(h.session.cell(&real, &h.col(0)), Some("x"));
    assert!(h.session.cell(&temp, &h.col(0)).is_none());
    Ok(())
}

#[test]
fn test_failed_add_column_restores_columns() -> Result<()> {
    let mut h = harness(&["Name", "Age"], 2)?;
    let before = column_ids(h.session.columns());
    h.store.fail_next(Operation::AddColumn, 1);

    h.session.add_column();
    h.session.poll();
    assert_eq!(column_ids(h.session.columns()), before);
    assert!(h.session.rows().iter().all(|r| r.cells.len() == before.len()));
    Ok(())
}

#[test]
fn test_selection_rectangle_is_direction_independent() -> Result<()> {
    let mut h = harness(&["A", "B", "C", "D", "E"], 5)?;
    let (r0, c0, r2, c2) = (h.row(0), h.col(0), h.row(2), h.col(2));

    h.session.start_selection(&r0, &c0);
    h.session.update_selection(&r2, &c2);
    h.session.end_selection();
    let forward = h.session.selection().selected_cells().clone();

    h.session.start_selection(&r2, &c2);
    h.session.update_selection(&r0, &c0);
    h.session.end_selection();
    let backward = h.session.selection().selected_cells().clone();

    assert_eq!(forward.len(), 9);
    assert_eq!(forward, backward);
    for r in 0..3 {
        for c in 0..3 {
            assert!(h.session.selection().is_selected(&h.row(r), &h.col(c)));
        }
    }
    assert!(!h.session.selection().is_selected(&h.row(3), &c0));
    Ok(())
}

#[test]
fn test_undo_then_redo_restores_state_randomized() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let words = ["red", "green", "blue", "", "42", "x"];

    for _round in 0..5 {
        let mut h = harness(&["A", "B", "C"], 4)?;
        let edits = rng.gen_range(1..20);
        for _ in 0..edits {
            let row = h.row(rng.gen_range(0..4));
            let col = h.col(rng.gen_range(0..3));
            h.session.update_cell(&row, &col, words[rng.gen_range(0..words.len())]);
        }
        let after_edits: Vec<Row> = h.session.rows().to_vec();
        let recorded = h.session.history().entries().len();

        for k in 0..=recorded {
            for _ in 0..k {
                assert!(h.session.undo());
            }
            for _ in 0..k {
                assert!(h.session.redo());
            }
            assert_eq!(h.session.rows(), &after_edits[..], "k = {}", k);
        }
        assert!(!h.session.can_redo());
    }
    Ok(())
}

#[test]
fn test_new_edit_after_undo_discards_redo() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    let (row, col) = (h.row(0), h.col(0));
    h.session.update_cell(&row, &col, "one");
    h.session.update_cell(&row, &col, "two");
    assert!(h.session.undo());
    assert_eq!(h.session.cell(&row, &col), Some("one"));

    h.session.update_cell(&row, &col, "three");
    assert!(!h.session.can_redo());
    assert!(!h.session.redo());
    assert_eq!(h.session.cell(&row, &col), Some("three"));
    assert_eq!(h.session.history().entries().len(), 2);
    Ok(())
}

#[test]
fn test_evaluate_is_pure() -> Result<()> {
    let mut h = harness(&["Name", "Age"], 4)?;
    for (i, (name, age)) in [("d", "9"), ("b", "30"), ("a", "31"), ("c", "x")].iter().enumerate() {
        let row = h.row(i);
        h.session.update_cell(&row, &h.col(0), *name);
        h.session.update_cell(&row, &h.col(1), *age);
    }
    let filters = FilterGroup {
        combinator: Combinator::Or,
        conditions: vec![
            FilterCondition {
                id: "f1".into(),
                column_id: h.col(1),
                operator: FilterOperator::GreaterThan,
                value: "10".into(),
            },
            FilterCondition {
                id: "f2".into(),
                column_id: h.col(0),
                operator: FilterOperator::Is,
                value: "D".into(),
            },
        ],
        ..FilterGroup::default()
    };
    let sorts = [SortConfig::new(h.col(0), SortDirection::Asc)];
    let rows = h.session.rows().to_vec();
    let columns = h.session.columns().to_vec();

    let copy = rows.clone();
    let first = evaluate(&rows, &columns, &filters, &sorts, &[], "");
    let second = evaluate(&copy, &columns, &filters, &sorts, &[], "");
    let ids = |v: &[&Row]| v.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), [h.row(2), h.row(1), h.row(0)]);
    assert_eq!(rows, h.session.rows());
    Ok(())
}

#[test]
fn test_last_column_cannot_be_deleted() -> Result<()> {
    let mut h = harness(&["Only"], 2)?;
    assert!(!h.session.delete_column(&h.col(0)));
    assert_eq!(h.session.columns().len(), 1);
    assert_eq!(h.store.call_count(Operation::DeleteColumn), 0);
    Ok(())
}

#[test]
fn test_edit_reaches_store_after_quiet_window() -> Result<()> {
    let mut h = harness(&["Name", "Age", "Email"], 3)?;
    let (row1, name) = (h.row(0), h.col(0));
    h.session.update_cell(&row1, &name, "Alice");
    assert_eq!(h.session.cell(&row1, &name), Some("Alice"));

    h.clock.advance_ms(299);
    h.session.poll();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 0);

    h.clock.advance_ms(1);
    h.session.poll();
    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].row_id, row1);
    assert_eq!(updates[0].column_id, name);
    assert_eq!(updates[0].value, "Alice");
    Ok(())
}

#[test]
fn test_row_deleted_before_confirmation_stays_deleted() -> Result<()> {
    let mut h = harness(&["Name", "Age", "Email"], 3)?;
    h.store.set_resolution(Resolution::Manual);
    let temp = h.session.add_row().context("no table")?;
    assert!(h.session.delete_row(&temp));
    assert!(h.session.rows().iter().all(|r| r.id != temp));

    h.settle();
    assert_eq!(h.session.rows().len(), 3);
    assert!(h.session.rows().iter().all(|r| !is_temp_row_id(&r.id)));
    assert_eq!(h.store.call_count(Operation::DeleteRow), 1);
    let server = h.store.table_data(&h.session.operations().base_id().to_string()).context("table")?;
    assert_eq!(server.rows.len(), 3);
    Ok(())
}

#[test]
fn test_failed_write_reverts_to_server_value() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    let (row, col) = (h.row(0), h.col(0));
    h.session.update_cell(&row, &col, "kept");
    h.settle();
    assert_eq!(h.store.cell_value(&row, &col).as_deref(), Some("kept"));

    h.store.fail_next(Operation::UpdateCell, 1);
    h.session.update_cell(&row, &col, "lost");
    let events = h.settle();
    assert!(events.contains(&SessionEvent::Table(Reconciled::CellReverted {
        row_id: row.clone(),
        column_id: col.clone(),
    })));
    assert_eq!(h.session.cell(&row, &col), Some("kept"));
    Ok(())
}

#[test]
fn test_failed_delete_row_restores_the_row_in_place() -> Result<()> {
    let mut h = harness(&["Name"], 3)?;
    let middle = h.row(1);
    h.store.set_resolution(Resolution::Manual);
    assert!(h.session.delete_row(&middle));
    assert_eq!(h.session.rows().len(), 2);

    h.store.fail_first(Operation::DeleteRow, RemoteError::Rejected("locked".into()));
    h.session.poll();
    let ids: Vec<String> = h.session.rows().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, [h.row(0), middle, h.row(2)]);
    Ok(())
}

#[test]
fn test_switching_tables_discards_late_results() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    h.store.set_resolution(Resolution::Manual);
    h.session.add_row();
    h.session.switch_table(&h.data.table.id.clone());

    h.store.resolve_all();
    let events = h.session.poll();
    assert!(events
        .iter()
        .all(|e| !matches!(e, SessionEvent::Table(Reconciled::RowConfirmed { .. }))));
    h.store.resolve_all();
    h.session.poll();
    assert!(h.session.rows().iter().all(|r| !is_temp_row_id(&r.id)));
    Ok(())
}

fn confirmed_row(events: &[SessionEvent]) -> Option<String> {
    events.iter().find_map(|e| match e {
        SessionEvent::Table(Reconciled::RowConfirmed { row_id, .. }) => Some(row_id.clone()),
        _ => None,
    })
}

fn confirmed_column(events: &[SessionEvent]) -> Option<String> {
    events.iter().find_map(|e| match e {
        SessionEvent::Table(Reconciled::ColumnConfirmed { column_id, .. }) => Some(column_id.clone()),
        _ => None,
    })
}

#[test]
fn test_failed_write_keeps_newer_debounced_edit_with_same_value() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    let (row, col) = (h.row(0), h.col(0));
    h.store.set_resolution(Resolution::Manual);

    h.session.update_cell(&row, &col, "A");
    h.clock.advance_ms(300);
    h.session.poll();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 1);

    h.session.update_cell(&row, &col, "AB");
    h.session.update_cell(&row, &col, "A");
    h.store.fail_first(Operation::UpdateCell, RemoteError::Rejected("conflict".into()));
    let events = h.session.poll();
    assert!(events
        .iter()
        .all(|e| !matches!(e, SessionEvent::Table(Reconciled::CellReverted { .. }))));
    assert_eq!(h.session.cell(&row, &col), Some("A"));

    h.settle();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 2);
    assert_eq!(h.store.cell_value(&row, &col).as_deref(), Some("A"));
    assert_eq!(h.session.cell(&row, &col), Some("A"));
    Ok(())
}

#[test]
fn test_temp_column_edits_are_sent_against_the_real_id() -> Result<()> {
    let mut h = harness(&["Name"], 2)?;
    h.store.set_resolution(Resolution::Manual);
    let temp = h.session.add_column().context("no table")?;
    let row = h.row(1);
    h.session.update_cell(&row, &temp, "v");
    h.clock.advance_ms(500);
    h.session.poll();
    assert_eq!(h.store.call_count(Operation::UpdateCell), 0);

    let events = h.settle();
    let real = confirmed_column(&events).context("column was not confirmed")?;
    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].column_id, real);
    assert_eq!(updates[0].value, "v");
    assert_eq!(h.store.cell_value(&row, &real).as_deref(), Some("v"));
    assert_eq!(h.session.cell(&row, &real), Some("v"));
    Ok(())
}

#[test]
fn test_column_deleted_before_confirmation_is_removed_remotely() -> Result<()> {
    let mut h = harness(&["Name", "Age"], 1)?;
    let before = column_ids(h.session.columns());
    h.store.set_resolution(Resolution::Manual);
    let temp = h.session.add_column().context("no table")?;
    assert!(h.session.delete_column(&temp));
    assert_eq!(column_ids(h.session.columns()), before);
    assert_eq!(h.store.call_count(Operation::DeleteColumn), 0);

    let events = h.settle();
    assert!(confirmed_column(&events).is_none());
    assert_eq!(column_ids(h.session.columns()), before);
    assert_eq!(h.store.call_count(Operation::DeleteColumn), 1);
    let server = h.store.table_data(h.session.operations().base_id()).context("table")?;
    assert_eq!(column_ids(&server.columns), before);
    Ok(())
}

#[test]
fn test_edit_in_temp_row_and_temp_column_waits_for_both() -> Result<()> {
    let mut h = harness(&["Name"], 1)?;
    h.store.set_resolution(Resolution::Manual);
    let temp_col = h.session.add_column().context("no table")?;
    let temp_row = h.session.add_row().context("no table")?;
    h.session.update_cell(&temp_row, &temp_col, "z");

    assert!(h.store.resolve_first(Operation::AddRow));
    let real_row = confirmed_row(&h.session.poll()).context("row was not confirmed")?;
    assert_eq!(h.store.call_count(Operation::UpdateCell), 0);
    assert_eq!(h.session.cell(&real_row, &temp_col), Some("z"));

    assert!(h.store.resolve_first(Operation::AddColumn));
    let real_col = confirmed_column(&h.session.poll()).context("column was not confirmed")?;
    h.store.resolve_all();
    h.session.poll();

    let updates = h.store.cell_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].row_id, real_row);
    assert_eq!(updates[0].column_id, real_col);
    assert_eq!(updates[0].value, "z");
    assert_eq!(h.store.cell_value(&real_row, &real_col).as_deref(), Some("z"));
    Ok(())
}

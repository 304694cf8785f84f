//! Cell-to-cell movement over the visible ordering.

use crate::keys::CellKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Top-left visible cell, if the grid has at least one row and one column.
pub fn first_cell<R: AsRef<str>, C: AsRef<str>>(rows: &[R], columns: &[C]) -> Option<CellKey> {
    Some(CellKey::new(rows.first()?.as_ref(), columns.first()?.as_ref()))
}

/// Moves one cell in `direction`, staying put at the edges.
///
/// Returns `None` if `from` is not part of the visible ordering.
pub fn step<R: AsRef<str>, C: AsRef<str>>(
    from: &CellKey,
    direction: Direction,
    rows: &[R],
    columns: &[C],
) -> Option<CellKey> {
    let row = rows.iter().position(|r| r.as_ref() == from.row_id)?;
    let col = columns.iter().position(|c| c.as_ref() == from.column_id)?;

    let (row, col) = match direction {
        Direction::Up => (row.saturating_sub(1), col),
        Direction::Down => ((row + 1).min(rows.len() - 1), col),
        Direction::Left => (row, col.saturating_sub(1)),
        Direction::Right => (row, (col + 1).min(columns.len() - 1)),
    };
    Some(CellKey::new(rows[row].as_ref(), columns[col].as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: [&str; 3] = ["r0", "r1", "r2"];
    const COLS: [&str; 2] = ["c0", "c1"];

    #[test]
    fn test_step_clamps_at_edges() {
        let origin = CellKey::new("r0", "c0");
        assert_eq!(step(&origin, Direction::Up, &ROWS, &COLS), Some(origin.clone()));
        assert_eq!(step(&origin, Direction::Left, &ROWS, &COLS), Some(origin.clone()));
        assert_eq!(step(&origin, Direction::Down, &ROWS, &COLS), Some(CellKey::new("r1", "c0")));

        let corner = CellKey::new("r2", "c1");
        assert_eq!(step(&corner, Direction::Down, &ROWS, &COLS), Some(corner.clone()));
        assert_eq!(step(&corner, Direction::Right, &ROWS, &COLS), Some(corner));
    }

    #[test]
    fn test_step_from_hidden_cell() {
        let hidden = CellKey::new("r9", "c0");
        assert_eq!(step(&hidden, Direction::Down, &ROWS, &COLS), None);
    }

    #[test]
    fn test_first_cell() {
        assert_eq!(first_cell(&ROWS, &COLS), Some(CellKey::new("r0", "c0")));
        let empty: [&str; 0] = [];
        assert_eq!(first_cell(&empty, &COLS), None);
    }
}

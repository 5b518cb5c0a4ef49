use super::grid_world::{Action, Cell, Grid};
use crate::mdps::value_table::ValueTable;
use itertools::Itertools;

const VALUE_CELL_WIDTH: usize = 7;
const POLICY_CELL_WIDTH: usize = 6;

/// Row-major dump of `v`, two decimals per cell.
pub fn render_values(grid: &Grid, v: &ValueTable<Cell>) -> String {
    let sep = "-".repeat(grid.cols * VALUE_CELL_WIDTH);
    render_rows(grid, &sep, |c| format!("{:5.2} |", v.get(c)))
}

/// Row-major dump of the action `lookup` picks for each cell. Cells without
/// an action are hatched.
pub fn render_policy(grid: &Grid, lookup: impl Fn(Cell) -> Option<Action>) -> String {
    let sep = "=".repeat(grid.cols * POLICY_CELL_WIDTH);
    render_rows(grid, &sep, |c| match lookup(c) {
        Some(a) => format!("  {a}  |"),
        None => "|".repeat(POLICY_CELL_WIDTH),
    })
}

fn render_rows(grid: &Grid, sep: &str, cell: impl Fn(Cell) -> String) -> String {
    let rows = (0..grid.rows).map(|row| (0..grid.cols).map(|col| cell(Cell::new(row, col))).join(""));

    rows.flat_map(|line| [sep.to_string(), line])
        .chain(std::iter::once(sep.to_string()))
        .join("\n")
}

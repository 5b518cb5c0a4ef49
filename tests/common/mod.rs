use gridmdp::envs::grid_world::{Action, Cell};
use std::path::PathBuf;

/// Scratch file under the system temp dir, unique per test process.
#[allow(dead_code)]
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gridmdp-{}-{name}.json", std::process::id()))
}

/// Actions every optimal policy of the standard grid agrees on.
#[allow(dead_code)]
pub fn assert_standard_optimal(lookup: impl Fn(Cell) -> Option<Action>) {
    assert_eq!(lookup(Cell::new(0, 2)), Some(Action::Right));
    assert_eq!(lookup(Cell::new(1, 2)), Some(Action::Up));
    assert_eq!(lookup(Cell::new(0, 1)), Some(Action::Right));
    assert_eq!(lookup(Cell::new(0, 3)), None);
    assert_eq!(lookup(Cell::new(1, 1)), None);
}

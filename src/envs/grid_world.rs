use crate::mdps::mdp::Mdp;
use crate::{Error, Result};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "U")]
    Up,
    #[serde(rename = "D")]
    Down,
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    pub fn label(&self) -> char {
        match self {
            Action::Up => 'U',
            Action::Down => 'D',
            Action::Left => 'L',
            Action::Right => 'R',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Layout shared by every grid world: size, start cell, per-cell legal
/// actions and rewards. Cells without actions are terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub start: Cell,
    pub actions: HashMap<Cell, Vec<Action>>,
    pub rewards: HashMap<Cell, f64>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, start: Cell) -> Self {
        Self {
            rows,
            cols,
            start,
            actions: HashMap::new(),
            rewards: HashMap::new(),
        }
    }

    pub fn set_config(&mut self, actions: HashMap<Cell, Vec<Action>>, rewards: HashMap<Cell, f64>) {
        self.actions = actions;
        self.rewards = rewards;
    }

    /// All cells, row-major.
    pub fn cells(&self) -> Vec<Cell> {
        iproduct!(0..self.rows, 0..self.cols)
            .map(|(row, col)| Cell::new(row, col))
            .collect()
    }

    /// Cell reached by moving from `c` in direction `a`; the border holds the
    /// agent in place.
    pub fn neighbour(&self, c: Cell, a: Action) -> Cell {
        let Cell { mut row, mut col } = c;
        match a {
            Action::Up if row > 0 => row -= 1,
            Action::Down if row + 1 < self.rows => row += 1,
            Action::Left if col > 0 => col -= 1,
            Action::Right if col + 1 < self.cols => col += 1,
            _ => {}
        }

        Cell::new(row, col)
    }
}

/// How an action taken in a cell spreads over destination cells.
pub trait Dynamics {
    fn successors(&self, grid: &Grid, from: Cell, a: Action) -> Vec<(Cell, f64)>;
}

/// The intended move always succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Deterministic;

impl Dynamics for Deterministic {
    fn successors(&self, grid: &Grid, from: Cell, a: Action) -> Vec<(Cell, f64)> {
        vec![(grid.neighbour(from, a), 1.)]
    }
}

/// Explicit probability table. Pairs missing from the table have no
/// successors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slippery {
    table: HashMap<(Cell, Action), Vec<(Cell, f64)>>,
}

impl Slippery {
    pub const TOLERANCE: f64 = 1e-9;

    pub fn new(table: HashMap<(Cell, Action), Vec<(Cell, f64)>>) -> Self {
        Self { table }
    }

    /// Table where the intended move succeeds with `p` and the agent stays put
    /// otherwise, for every legal pair of `grid`.
    pub fn sticky(grid: &Grid, p: f64) -> Self {
        let table = grid
            .actions
            .iter()
            .flat_map(|(&c, actions)| {
                actions
                    .iter()
                    .map(move |&a| ((c, a), vec![(c, 1. - p), (grid.neighbour(c, a), p)]))
            })
            .collect();

        Self { table }
    }

    pub fn set(&mut self, from: Cell, a: Action, dist: Vec<(Cell, f64)>) {
        self.table.insert((from, a), dist);
    }

    pub fn get(&self, from: Cell, a: Action) -> Option<&[(Cell, f64)]> {
        self.table.get(&(from, a)).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((Cell, Action), &[(Cell, f64)])> + '_ {
        self.table.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Every row must be a probability distribution.
    pub fn validate(&self) -> Result<()> {
        for (&(state, action), dist) in &self.table {
            let sum: f64 = dist.iter().map(|(_, p)| p).sum();
            let negative = dist.iter().any(|&(_, p)| p < 0.);
            if negative || (sum - 1.).abs() > Self::TOLERANCE {
                return Err(Error::InvalidDistribution {
                    state: state.to_string(),
                    action: action.to_string(),
                    sum,
                });
            }
        }

        Ok(())
    }
}

impl Dynamics for Slippery {
    fn successors(&self, _grid: &Grid, from: Cell, a: Action) -> Vec<(Cell, f64)> {
        self.get(from, a).map(<[_]>::to_vec).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridWorld<D> {
    grid: Grid,
    dynamics: D,
}

pub type DeterministicGridWorld = GridWorld<Deterministic>;

pub type StochasticGridWorld = GridWorld<Slippery>;

impl<D> GridWorld<D> {
    pub fn new(grid: Grid, dynamics: D) -> Self {
        Self { grid, dynamics }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    pub fn start(&self) -> Cell {
        self.grid.start
    }
}

impl<D: Dynamics> Mdp for GridWorld<D> {
    type State = Cell;

    type Action = Action;

    fn states(&self) -> Vec<Cell> {
        self.grid.cells()
    }

    fn actions(&self, s: Cell) -> &[Action] {
        self.grid
            .actions
            .get(&s)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn reward(&self, s: Cell) -> f64 {
        self.grid.rewards.get(&s).copied().unwrap_or(0.)
    }

    fn successors(&self, s: Cell, a: Action) -> Vec<(Cell, f64)> {
        if !self.actions(s).contains(&a) {
            return vec![];
        }

        self.dynamics.successors(&self.grid, s, a)
    }
}

/// The classic 3x4 layout: goal at (0,3), pit at (1,3), wall at (1,1), start
/// at (2,0). Every other cell pays `cost`.
pub fn standard_layout(cost: f64) -> Grid {
    use Action::*;

    let mut g = Grid::new(3, 4, Cell::new(2, 0));

    let mut rewards = g.cells().into_iter().map(|c| (c, cost)).collect::<HashMap<_, _>>();
    rewards.insert(Cell::new(0, 3), 1.);
    rewards.insert(Cell::new(1, 3), -1.);
    rewards.insert(Cell::new(1, 1), 0.);

    let actions = HashMap::from([
        (Cell::new(0, 0), vec![Down, Right]),
        (Cell::new(0, 1), vec![Right, Left]),
        (Cell::new(0, 2), vec![Right, Left, Down]),
        (Cell::new(1, 0), vec![Up, Down]),
        (Cell::new(1, 2), vec![Right, Up, Down]),
        (Cell::new(2, 0), vec![Up, Right]),
        (Cell::new(2, 1), vec![Right, Left]),
        (Cell::new(2, 2), vec![Up, Right, Left]),
        (Cell::new(2, 3), vec![Left, Up]),
    ]);

    g.set_config(actions, rewards);
    g
}

pub fn standard_grid(cost: f64) -> DeterministicGridWorld {
    GridWorld::new(standard_layout(cost), Deterministic)
}

/// Standard layout where moves succeed with 0.8 and stick with 0.2. Going up
/// from (1,2) splits the successful mass between (0,2) and the pit.
pub fn standard_sticky_grid(cost: f64) -> StochasticGridWorld {
    let grid = standard_layout(cost);
    let mut dynamics = Slippery::sticky(&grid, 0.8);
    dynamics.set(
        Cell::new(1, 2),
        Action::Up,
        vec![
            (Cell::new(1, 2), 0.2),
            (Cell::new(0, 2), 0.4),
            (Cell::new(1, 3), 0.4),
        ],
    );

    GridWorld::new(grid, dynamics)
}

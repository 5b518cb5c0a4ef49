use super::mdp::Mdp;
use log::debug;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

pub trait Weighted<S> {
    fn s(&self) -> S;

    fn p(&self) -> f64;
}

impl<S: Copy> Weighted<S> for (S, f64) {
    fn s(&self) -> S {
        self.0
    }

    fn p(&self) -> f64 {
        self.1
    }
}

/// Categorical sample over `ts`. `None` if `ts` is empty or carries no mass.
pub fn pick_next<T, S>(rng: &mut StdRng, ts: &[T]) -> Option<S>
where
    T: Weighted<S>,
{
    let dist = WeightedIndex::new(ts.iter().map(|item| item.p())).ok()?;
    ts.get(dist.sample(rng)).map(|item| item.s())
}

/// The "current state" cursor of one rollout, along with the randomness that
/// drives it. The model itself stays immutable and shareable.
#[derive(Debug, Clone)]
pub struct SimulationContext<S> {
    cursor: S,
    rng: StdRng,
}

impl<S: Copy + PartialEq + std::fmt::Debug> SimulationContext<S> {
    pub fn new(start: S, seed: u64) -> Self {
        Self::from_rng(start, StdRng::seed_from_u64(seed))
    }

    pub fn from_rng(start: S, rng: StdRng) -> Self {
        Self { cursor: start, rng }
    }

    pub fn state(&self) -> S {
        self.cursor
    }

    pub fn reset(&mut self, s: S) {
        self.cursor = s;
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Applies `a` at the cursor and returns `(reward, next_state)`.
    ///
    /// Illegal actions, terminal cursors and pairs without a distribution leave
    /// the cursor in place and pay 0.
    pub fn step<M>(&mut self, mdp: &M, a: M::Action) -> (f64, S)
    where
        M: Mdp<State = S>,
    {
        if !mdp.actions(self.cursor).contains(&a) {
            debug!("illegal action {a:?} in {:?}, staying put", self.cursor);
            return (0., self.cursor);
        }

        let ts = mdp.successors(self.cursor, a);
        match pick_next(&mut self.rng, &ts) {
            Some(next) => {
                self.cursor = next;
                (mdp.reward(next), next)
            }
            None => {
                debug!("no transitions for ({:?}, {a:?})", self.cursor);
                (0., self.cursor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::grid_world::{
        standard_grid, standard_sticky_grid, Action, Cell, GridWorld, Slippery,
    };
    use float_eq::*;
    use std::collections::HashMap;

    #[test]
    fn sticky_rows_are_sampled_by_weight() {
        let gw = standard_sticky_grid(-0.1);
        let row = gw.successors(Cell::new(1, 2), Action::Up);

        let rng = &mut StdRng::seed_from_u64(2718);
        let n = 100_000;
        let mut counts = HashMap::<Cell, usize>::new();
        for _ in 0..n {
            *counts.entry(pick_next(rng, &row).unwrap()).or_default() += 1;
        }

        let freq = |c: Cell| counts.get(&c).copied().unwrap_or(0) as f64 / n as f64;
        assert_float_eq!(freq(Cell::new(1, 2)), 0.2, abs <= 1e-2);
        assert_float_eq!(freq(Cell::new(0, 2)), 0.4, abs <= 1e-2);
        assert_float_eq!(freq(Cell::new(1, 3)), 0.4, abs <= 1e-2);
    }

    #[test]
    fn rows_without_mass_yield_nothing() {
        let rng = &mut StdRng::seed_from_u64(2718);
        let empty: Vec<(Cell, f64)> = vec![];
        assert_eq!(pick_next(rng, &empty), None);
        assert_eq!(pick_next(rng, &[(Cell::new(0, 0), 0.)]), None);
    }

    #[test]
    fn legal_step_moves_and_pays_the_arrival_reward() {
        let gw = standard_grid(-0.1);
        let ctx = &mut SimulationContext::new(Cell::new(0, 2), 2718);

        assert_eq!(ctx.step(&gw, Action::Right), (1., Cell::new(0, 3)));
        assert_eq!(ctx.state(), Cell::new(0, 3));
    }

    #[test]
    fn illegal_step_stays_put_and_pays_nothing() {
        let gw = standard_grid(-0.1);
        let ctx = &mut SimulationContext::new(Cell::new(2, 0), 2718);

        assert_eq!(ctx.step(&gw, Action::Left), (0., Cell::new(2, 0)));
        assert_eq!(ctx.step(&gw, Action::Down), (0., Cell::new(2, 0)));
        assert_eq!(ctx.state(), Cell::new(2, 0));
    }

    #[test]
    fn terminal_cursor_does_not_move() {
        let gw = standard_grid(-0.1);
        let ctx = &mut SimulationContext::new(Cell::new(0, 3), 2718);

        for a in Action::ALL {
            assert_eq!(ctx.step(&gw, a), (0., Cell::new(0, 3)));
        }
    }

    #[test]
    fn missing_row_is_a_noop() {
        let sticky = standard_sticky_grid(-0.1);
        let mut table = sticky
            .dynamics()
            .iter()
            .map(|(k, row)| (k, row.to_vec()))
            .collect::<HashMap<_, _>>();
        table.remove(&(Cell::new(2, 0), Action::Up));
        let gw = GridWorld::new(sticky.grid().clone(), Slippery::new(table));

        let ctx = &mut SimulationContext::new(Cell::new(2, 0), 2718);
        assert_eq!(ctx.step(&gw, Action::Up), (0., Cell::new(2, 0)));

        // The other legal action keeps its row.
        let (_, next) = ctx.step(&gw, Action::Right);
        assert!(next == Cell::new(2, 0) || next == Cell::new(2, 1));
    }
}

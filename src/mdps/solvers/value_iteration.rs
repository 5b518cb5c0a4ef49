use super::{best_action, greedy_policy, lookahead, MdpSolver, SolverState};
use crate::mdps::mdp::Mdp;
use crate::mdps::policy::DeterministicPolicy;
use crate::mdps::value_table::ValueTable;
use log::{debug, info};

/// Value iteration with in-place sweeps. Terminal states are never updated
/// and keep the value 0.
#[derive(Debug, Clone)]
pub struct ValueIteration<'a, M: Mdp> {
    mdp: &'a M,
    gamma: f64,
    max_sweeps: usize,
    v: ValueTable<M::State>,
    state: SolverState,
}

impl<'a, M: Mdp> ValueIteration<'a, M> {
    pub const DEFAULT_MAX_SWEEPS: usize = 1000;

    pub fn new(mdp: &'a M, gamma: f64) -> Self {
        Self {
            mdp,
            gamma,
            max_sweeps: Self::DEFAULT_MAX_SWEEPS,
            v: ValueTable::zeros(mdp.states()),
            state: SolverState::Uninitialized,
        }
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn values(&self) -> &ValueTable<M::State> {
        &self.v
    }

    pub fn policy(&self) -> DeterministicPolicy<M::State, M::Action> {
        greedy_policy(self.mdp, &self.v, self.gamma)
    }

    /// One sweep over the non-terminal states. Returns the largest change.
    fn sweep(&mut self) -> f64 {
        let mut delta: f64 = 0.;
        for s in self.mdp.non_terminal_states() {
            let Some((_, new)) = best_action(self.mdp, &self.v, self.gamma, s) else {
                continue;
            };
            delta = delta.max((new - self.v.get(s)).abs());
            self.v.set(s, new);
        }

        delta
    }
}

impl<'a, M: Mdp> MdpSolver<M, bool> for ValueIteration<'a, M> {
    fn v_star(&self, s: M::State) -> f64 {
        self.v.get(s)
    }

    fn q_star(&self, s: M::State, a: M::Action) -> Option<f64> {
        if !self.mdp.actions(s).contains(&a) {
            return None;
        }

        Some(lookahead(self.mdp, &self.v, self.gamma, s, a))
    }

    fn pi_star(&self, s: M::State) -> Option<M::Action> {
        best_action(self.mdp, &self.v, self.gamma, s).map(|(a, _)| a)
    }

    /// Sweeps until the largest change drops below `theta`. Returns whether it
    /// converged and the number of sweeps.
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize) {
        let cap = num_iterations.unwrap_or(self.max_sweeps);
        self.state = SolverState::Evaluating;

        for sweep in 1..=cap {
            let delta = self.sweep();
            debug!("value iteration sweep {sweep}: delta = {delta:.6}");
            if delta < theta {
                info!("value iteration converged after {sweep} sweeps");
                self.state = SolverState::Converged;
                return (true, sweep);
            }
        }

        info!("value iteration stopped at the cap of {cap} sweeps");
        (false, cap)
    }

    fn state(&self) -> SolverState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::grid_world::{standard_grid, standard_sticky_grid, Action, Cell};
    use crate::envs::simple_golf::SimpleGolf;
    use crate::mdps::solvers::bellman_residual;
    use float_eq::*;
    use rstest::rstest;

    #[test]
    fn simple_golf_putts_towards_the_hole() {
        let mdp = SimpleGolf::new();
        let vi = &mut ValueIteration::new(&mdp, 0.9);
        assert_eq!(vi.state(), SolverState::Uninitialized);

        let (converged, _) = vi.exec(1e-6, None);
        assert!(converged);
        assert_eq!(vi.state(), SolverState::Converged);

        assert_eq!(vi.pi_star(0), Some(0));
        assert_eq!(vi.pi_star(1), Some(2));
        assert_eq!(vi.pi_star(2), None);
        assert_eq!(vi.v_star(2), 0.);
        assert_eq!(vi.q_star(0, 2), None);

        // V(1) = 0.9 * 10 + 0.1 * 0.9 * V(1)
        assert_float_eq!(vi.v_star(1), 9. / 0.91, abs <= 1e-4);
        assert!(vi.v_star(0) < vi.v_star(1));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(-0.04)]
    #[case(-2.)]
    fn deterministic_grid_is_a_fixed_point(#[case] cost: f64) {
        let gw = standard_grid(cost);
        let vi = &mut ValueIteration::new(&gw, 0.9);
        let (converged, sweeps) = vi.exec(1e-3, None);

        assert!(converged);
        assert!(sweeps > 1);
        assert!(bellman_residual(&gw, vi.values(), 0.9) < 1e-3);
    }

    #[test]
    fn standard_grid_values() {
        let gw = standard_grid(-0.1);
        let vi = &mut ValueIteration::new(&gw, 0.9);
        vi.exec(1e-3, None);

        assert_eq!(vi.v_star(Cell::new(0, 3)), 0.);
        assert_eq!(vi.v_star(Cell::new(1, 3)), 0.);
        assert_eq!(vi.v_star(Cell::new(1, 1)), 0.);

        let start = vi.v_star(Cell::new(2, 0));
        assert!(-1. < start && start < 1.);
        assert_float_eq!(start, 0.3122, abs <= 1e-3);
        assert_float_eq!(vi.v_star(Cell::new(0, 2)), 1., abs <= 1e-9);

        assert_eq!(vi.pi_star(Cell::new(0, 2)), Some(Action::Right));
        assert_eq!(vi.pi_star(Cell::new(1, 2)), Some(Action::Up));
        assert_eq!(vi.pi_star(Cell::new(2, 3)), Some(Action::Left));
        assert_eq!(vi.pi_star(Cell::new(0, 3)), None);
    }

    #[test]
    fn q_star_is_consistent_with_v_star() {
        let gw = standard_sticky_grid(-0.1);
        let vi = &mut ValueIteration::new(&gw, 0.9);
        let (converged, _) = vi.exec(1e-6, None);
        assert!(converged);

        for s in gw.non_terminal_states() {
            let best = gw
                .actions(s)
                .iter()
                .map(|&a| vi.q_star(s, a).unwrap())
                .fold(f64::NEG_INFINITY, f64::max);
            assert_float_eq!(best, vi.v_star(s), abs <= 1e-5);
        }
        assert_eq!(vi.q_star(Cell::new(2, 0), Action::Left), None);
    }

    #[test]
    fn sweep_cap_is_best_effort() {
        let gw = standard_sticky_grid(-0.1);
        let vi = &mut ValueIteration::new(&gw, 0.9).with_max_sweeps(2);
        let (converged, sweeps) = vi.exec(1e-9, None);

        assert!(!converged);
        assert_eq!(sweeps, 2);
        assert_eq!(vi.state(), SolverState::Evaluating);
        assert!(vi.policy().len() == gw.non_terminal_states().len());
    }
}

pub mod mc_methods;
pub mod policy_iteration;
pub mod value_iteration;

use super::mdp::Mdp;
use super::policy::{argmax_by, DeterministicPolicy};
use super::value_table::ValueTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Evaluating,
    Converged,
}

/// Common surface of the model-based solvers.
pub trait MdpSolver<M: Mdp, T> {
    fn v_star(&self, s: M::State) -> f64;

    /// `None` when `a` is not legal in `s`.
    fn q_star(&self, s: M::State, a: M::Action) -> Option<f64>;

    /// `None` for terminal states.
    fn pi_star(&self, s: M::State) -> Option<M::Action>;

    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (T, usize);

    fn state(&self) -> SolverState;
}

/// `Σ_s' P(s'|s,a) (R(s') + γ V(s'))`
pub fn lookahead<M: Mdp>(mdp: &M, v: &ValueTable<M::State>, gamma: f64, s: M::State, a: M::Action) -> f64 {
    mdp.successors(s, a)
        .into_iter()
        .map(|(next, p)| p * (mdp.reward(next) + gamma * v.get(next)))
        .sum()
}

/// Best one-step lookahead action of `s` and its value. Ties go to the first
/// legal action.
pub fn best_action<M: Mdp>(
    mdp: &M,
    v: &ValueTable<M::State>,
    gamma: f64,
    s: M::State,
) -> Option<(M::Action, f64)> {
    argmax_by(mdp.actions(s), |a| lookahead(mdp, v, gamma, s, a))
}

/// Greedy deterministic policy w.r.t. `v` over every non-terminal state.
pub fn greedy_policy<M: Mdp>(
    mdp: &M,
    v: &ValueTable<M::State>,
    gamma: f64,
) -> DeterministicPolicy<M::State, M::Action> {
    mdp.non_terminal_states()
        .into_iter()
        .filter_map(|s| best_action(mdp, v, gamma, s).map(|(a, _)| (s, a)))
        .collect()
}

/// Largest Bellman optimality residual over the non-terminal states.
pub fn bellman_residual<M: Mdp>(mdp: &M, v: &ValueTable<M::State>, gamma: f64) -> f64 {
    mdp.non_terminal_states()
        .into_iter()
        .filter_map(|s| best_action(mdp, v, gamma, s).map(|(_, q)| (q - v.get(s)).abs()))
        .fold(0., f64::max)
}

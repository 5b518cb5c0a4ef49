use super::{best_action, lookahead, MdpSolver, SolverState};
use crate::mdps::mdp::Mdp;
use crate::mdps::policy::DeterministicPolicy;
use crate::mdps::value_table::ValueTable;
use log::{debug, info};

/// Policy iteration: iterative policy evaluation followed by greedy
/// improvement, until no state changes its action.
#[derive(Debug, Clone)]
pub struct PolicyIteration<'a, M: Mdp> {
    mdp: &'a M,
    gamma: f64,
    evaluation_iterations: usize,
    policy_iterations: usize,
    v: ValueTable<M::State>,
    pi: DeterministicPolicy<M::State, M::Action>,
    state: SolverState,
}

impl<'a, M: Mdp> PolicyIteration<'a, M> {
    pub const DEFAULT_EVALUATION_ITERATIONS: usize = 100;
    pub const DEFAULT_POLICY_ITERATIONS: usize = 10;

    pub fn new(mdp: &'a M, gamma: f64, pi: DeterministicPolicy<M::State, M::Action>) -> Self {
        Self {
            mdp,
            gamma,
            evaluation_iterations: Self::DEFAULT_EVALUATION_ITERATIONS,
            policy_iterations: Self::DEFAULT_POLICY_ITERATIONS,
            v: ValueTable::zeros(mdp.states()),
            pi,
            state: SolverState::Uninitialized,
        }
    }

    /// `evaluation_iterations` caps the sweeps of one evaluation; the number of
    /// improvement rounds is capped at `policy_iterations * evaluation_iterations`.
    pub fn with_caps(mut self, evaluation_iterations: usize, policy_iterations: usize) -> Self {
        self.evaluation_iterations = evaluation_iterations;
        self.policy_iterations = policy_iterations;
        self
    }

    pub fn values(&self) -> &ValueTable<M::State> {
        &self.v
    }

    pub fn policy(&self) -> &DeterministicPolicy<M::State, M::Action> {
        &self.pi
    }

    /// Iterative evaluation of the current policy. Returns the sweeps used.
    pub fn evaluate(&mut self, theta: f64) -> usize {
        for sweep in 1..=self.evaluation_iterations {
            let mut delta: f64 = 0.;
            for s in self.mdp.non_terminal_states() {
                let new = match self.pi.get(s) {
                    Some(a) => lookahead(self.mdp, &self.v, self.gamma, s, a),
                    None => 0.,
                };
                delta = delta.max((new - self.v.get(s)).abs());
                self.v.set(s, new);
            }

            if delta < theta {
                return sweep;
            }
        }

        self.evaluation_iterations
    }

    /// Greedy improvement. Returns `true` if no state changed its action.
    pub fn improve(&mut self) -> bool {
        let mut stable = true;
        for s in self.mdp.non_terminal_states() {
            if let Some((a, _)) = best_action(self.mdp, &self.v, self.gamma, s) {
                if self.pi.set(s, a) {
                    stable = false;
                }
            }
        }

        stable
    }
}

impl<'a, M: Mdp> MdpSolver<M, bool> for PolicyIteration<'a, M> {
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
        self.pi.get(s)
    }

    /// Returns whether the policy became stable and the number of improvement
    /// rounds run.
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize) {
        let cap = num_iterations.unwrap_or(self.policy_iterations * self.evaluation_iterations);
        self.state = SolverState::Evaluating;

        for round in 1..=cap {
            let sweeps = self.evaluate(theta);
            let stable = self.improve();
            debug!("policy iteration round {round}: {sweeps} evaluation sweeps, stable = {stable}");
            if stable {
                info!("policy iteration stable after {round} rounds");
                self.state = SolverState::Converged;
                return (true, round);
            }
        }

        info!("policy iteration stopped at the cap of {cap} rounds");
        (false, cap)
    }

    fn state(&self) -> SolverState {
        self.state
    }
}

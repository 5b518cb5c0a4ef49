use std::fmt::Debug;
use std::hash::Hash;

/// Markov Decision Process - Sutton & Barto 2018.
///
/// States and actions are opaque. A state is terminal iff it has no legal
/// actions. Rewards are paid on arrival in a state.
pub trait Mdp {
    type State: Copy + Eq + Hash + Debug;

    type Action: Copy + Eq + Hash + Debug;

    /// Every state of the model, in a fixed enumeration order.
    fn states(&self) -> Vec<Self::State>;

    /// Legal actions of `s`, in the order used for tie-breaking.
    fn actions(&self, s: Self::State) -> &[Self::Action];

    fn is_terminal(&self, s: Self::State) -> bool {
        self.actions(s).is_empty()
    }

    fn reward(&self, s: Self::State) -> f64;

    /// Destination distribution of taking `a` in `s`.
    ///
    /// Empty when `a` is not legal in `s`, when `s` is terminal, or when the
    /// model has no entry for the pair.
    fn successors(&self, s: Self::State, a: Self::Action) -> Vec<(Self::State, f64)>;

    /// `P(to | from, a)`.
    fn transition_probability(&self, to: Self::State, from: Self::State, a: Self::Action) -> f64 {
        self.successors(from, a)
            .into_iter()
            .filter(|(s, _)| *s == to)
            .map(|(_, p)| p)
            .sum()
    }

    fn non_terminal_states(&self) -> Vec<Self::State> {
        self.states()
            .into_iter()
            .filter(|&s| !self.is_terminal(s))
            .collect()
    }
}

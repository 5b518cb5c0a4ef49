use super::mdp::Mdp;
use super::mdp_simulator::pick_next;
use super::value_table::ValueTable;
use rand::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

pub trait Policy<S, A> {
    /// Action to take in `s`, `None` if the policy has nothing for `s`.
    fn action(&self, s: S, rng: &mut StdRng) -> Option<A>;
}

/// First action with the maximum score, together with that score.
///
/// Comparison is strict, so on ties the earliest action in `actions` wins.
pub fn argmax_by<A: Copy>(actions: &[A], mut score: impl FnMut(A) -> f64) -> Option<(A, f64)> {
    let mut best: Option<(A, f64)> = None;
    for &a in actions {
        let v = score(a);
        match best {
            Some((_, bv)) if v <= bv => {}
            _ => best = Some((a, v)),
        }
    }

    best
}

/// Greedy action w.r.t. `q` among `actions`; unseen pairs score 0.
pub fn greedy<S, A>(q: &ValueTable<(S, A)>, s: S, actions: &[A]) -> Option<A>
where
    S: Copy + Eq + Hash,
    A: Copy + Eq + Hash,
{
    argmax_by(actions, |a| q.get((s, a))).map(|(a, _)| a)
}

/// `1 - ε + ε/|A|` on `best`, `ε/|A|` on every other action.
pub fn epsilon_greedy_distribution<A: Copy + PartialEq>(
    best: A,
    actions: &[A],
    epsilon: f64,
) -> Vec<(A, f64)> {
    let epsilon = epsilon.clamp(0., 1.);
    let share = epsilon / actions.len() as f64;
    actions
        .iter()
        .map(|&a| {
            if a == best {
                (a, 1. - epsilon + share)
            } else {
                (a, share)
            }
        })
        .collect()
}

pub fn epsilon_greedy<S, A>(
    q: &ValueTable<(S, A)>,
    s: S,
    actions: &[A],
    epsilon: f64,
) -> Vec<(A, f64)>
where
    S: Copy + Eq + Hash,
    A: Copy + Eq + Hash,
{
    match greedy(q, s, actions) {
        Some(best) => epsilon_greedy_distribution(best, actions, epsilon),
        None => vec![],
    }
}

/// state -> action. Never holds entries for terminal states.
#[derive(Debug, Clone, PartialEq)]
pub struct DeterministicPolicy<S: Eq + Hash, A> {
    actions: HashMap<S, A>,
}

impl<S: Eq + Hash, A> Default for DeterministicPolicy<S, A> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }
}

impl<S: Copy + Eq + Hash, A: Copy + PartialEq> DeterministicPolicy<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniformly random legal action for every non-terminal state.
    pub fn random<M>(mdp: &M, rng: &mut StdRng) -> Self
    where
        M: Mdp<State = S, Action = A>,
    {
        mdp.non_terminal_states()
            .into_iter()
            .filter_map(|s| mdp.actions(s).choose(rng).map(|&a| (s, a)))
            .collect()
    }

    /// First legal action for every non-terminal state.
    pub fn first_legal<M>(mdp: &M) -> Self
    where
        M: Mdp<State = S, Action = A>,
    {
        mdp.non_terminal_states()
            .into_iter()
            .filter_map(|s| mdp.actions(s).first().map(|&a| (s, a)))
            .collect()
    }

    pub fn get(&self, s: S) -> Option<A> {
        self.actions.get(&s).copied()
    }

    /// Sets the action for `s` and reports whether it changed.
    pub fn set(&mut self, s: S, a: A) -> bool {
        self.actions.insert(s, a) != Some(a)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (S, A)> + '_ {
        self.actions.iter().map(|(&s, &a)| (s, a))
    }
}

impl<S: Copy + Eq + Hash, A: Copy + PartialEq> FromIterator<(S, A)> for DeterministicPolicy<S, A> {
    fn from_iter<I: IntoIterator<Item = (S, A)>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl<S: Copy + Eq + Hash, A: Copy + PartialEq> Policy<S, A> for DeterministicPolicy<S, A> {
    fn action(&self, s: S, _rng: &mut StdRng) -> Option<A> {
        self.get(s)
    }
}

/// state -> distribution over its legal actions.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticPolicy<S: Eq + Hash, A> {
    probs: HashMap<S, Vec<(A, f64)>>,
}

impl<S: Eq + Hash, A> Default for StochasticPolicy<S, A> {
    fn default() -> Self {
        Self {
            probs: HashMap::new(),
        }
    }
}

impl<S: Copy + Eq + Hash, A: Copy + PartialEq> StochasticPolicy<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal probability on every legal action of every non-terminal state.
    pub fn uniform<M>(mdp: &M) -> Self
    where
        M: Mdp<State = S, Action = A>,
    {
        let mut pi = Self::new();
        for s in mdp.non_terminal_states() {
            let actions = mdp.actions(s);
            let p = 1. / actions.len() as f64;
            pi.set(s, actions.iter().map(|&a| (a, p)).collect());
        }

        pi
    }

    /// Epsilon-soft version of `pi` over the legal actions of each state.
    pub fn soften<M>(mdp: &M, pi: &DeterministicPolicy<S, A>, epsilon: f64) -> Self
    where
        M: Mdp<State = S, Action = A>,
    {
        let mut soft = Self::new();
        for (s, a) in pi.iter() {
            soft.set(s, epsilon_greedy_distribution(a, mdp.actions(s), epsilon));
        }

        soft
    }

    pub fn distribution(&self, s: S) -> Option<&[(A, f64)]> {
        self.probs.get(&s).map(Vec::as_slice)
    }

    pub fn probability(&self, s: S, a: A) -> f64 {
        self.distribution(s)
            .and_then(|d| d.iter().find(|(b, _)| *b == a))
            .map_or(0., |&(_, p)| p)
    }

    pub fn set(&mut self, s: S, dist: Vec<(A, f64)>) {
        self.probs.insert(s, dist);
    }

    /// Most probable action of `s`; the first one on ties.
    pub fn greedy_action(&self, s: S) -> Option<A> {
        let d = self.distribution(s)?;
        let actions = d.iter().map(|&(a, _)| a).collect::<Vec<_>>();
        argmax_by(&actions, |a| self.probability(s, a)).map(|(a, _)| a)
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (S, &[(A, f64)])> + '_ {
        self.probs.iter().map(|(&s, d)| (s, d.as_slice()))
    }
}

impl<S: Copy + Eq + Hash, A: Copy + PartialEq> Policy<S, A> for StochasticPolicy<S, A> {
    fn action(&self, s: S, rng: &mut StdRng) -> Option<A> {
        pick_next(rng, self.distribution(s)?)
    }
}

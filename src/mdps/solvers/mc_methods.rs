use crate::mdps::episode::{play_episode, reset, Episode, EpisodeOptions, Start};
use crate::mdps::mdp::Mdp;
use crate::mdps::mdp_simulator::SimulationContext;
use crate::mdps::policy::{epsilon_greedy, greedy, DeterministicPolicy, Policy, StochasticPolicy};
use crate::mdps::value_table::{Returns, ValueTable};
use log::{info, warn};
use std::collections::HashSet;
use std::hash::Hash;

pub trait EpisodeGenerator<S, A> {
    fn generate(&mut self, n: usize) -> Vec<Episode<S, A>>;
}

/// Episodes of `policy` on `mdp`, each one started according to `start`.
pub struct PolicyRollouts<'a, M: Mdp, P> {
    pub mdp: &'a M,
    pub policy: &'a P,
    pub ctx: &'a mut SimulationContext<M::State>,
    pub start: Start<M::State>,
    pub options: EpisodeOptions,
}

impl<'a, M, P> EpisodeGenerator<M::State, M::Action> for PolicyRollouts<'a, M, P>
where
    M: Mdp,
    P: Policy<M::State, M::Action>,
{
    /// Stops early if there is no state to start from.
    fn generate(&mut self, n: usize) -> Vec<Episode<M::State, M::Action>> {
        let mut eps = Vec::with_capacity(n);
        for i in 0..n {
            log_progress(i, n);
            if !reset(self.mdp, self.ctx, self.start) {
                warn!("no non-terminal state to start from");
                break;
            }
            eps.push(play_episode(self.mdp, self.policy, self.ctx, self.options));
        }

        eps
    }
}

/// Ref: https://youtu.be/P0ZvxeQqv0A?si=RLKdOUTNEfKXE63C
pub fn mc_first_visit<S, A>(
    ep_gen: &mut dyn EpisodeGenerator<S, A>,
    gamma: f64,
    n_ep: usize,
) -> ValueTable<S>
where
    S: Copy + Eq + Hash,
{
    mc_state_core(ep_gen, gamma, n_ep, true)
}

/// Ref: https://youtu.be/P0ZvxeQqv0A?si=RLKdOUTNEfKXE63C
pub fn mc_every_visit<S, A>(
    ep_gen: &mut dyn EpisodeGenerator<S, A>,
    gamma: f64,
    n_ep: usize,
) -> ValueTable<S>
where
    S: Copy + Eq + Hash,
{
    mc_state_core(ep_gen, gamma, n_ep, false)
}

/// With `first_visit`, a state is counted once per episode: the backward scan
/// keeps a set of the states it already updated and skips repeats.
fn mc_state_core<S, A>(
    ep_gen: &mut dyn EpisodeGenerator<S, A>,
    gamma: f64,
    n_ep: usize,
    first_visit: bool,
) -> ValueTable<S>
where
    S: Copy + Eq + Hash,
{
    let mut returns = Returns::new();

    let eps = ep_gen.generate(n_ep);
    for ep in eps.iter().take(n_ep) {
        let ev = &ep.events;
        let mut seen = HashSet::new();
        let mut g = 0.;
        for t in (0..ev.len().saturating_sub(1)).rev() {
            g = gamma * g + ev[t + 1].r;
            if seen.insert(ev[t].s) || !first_visit {
                returns.push(ev[t].s, g);
            }
        }
    }

    returns.iter().map(|(s, m)| (s, m.mean)).collect()
}

/// Q estimates and the running means behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionValues<S: Eq + Hash, A: Eq + Hash> {
    pub q: ValueTable<(S, A)>,
    pub returns: Returns<(S, A)>,
}

impl<S: Eq + Hash, A: Eq + Hash> Default for ActionValues<S, A> {
    fn default() -> Self {
        Self {
            q: ValueTable::default(),
            returns: Returns::default(),
        }
    }
}

impl<S: Copy + Eq + Hash, A: Copy + Eq + Hash> ActionValues<S, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero entries for every legal pair of every non-terminal state.
    pub fn zeros<M>(mdp: &M) -> Self
    where
        M: Mdp<State = S, Action = A>,
    {
        let mut av = Self::new();
        for s in mdp.non_terminal_states() {
            for &a in mdp.actions(s) {
                av.q.set((s, a), 0.);
                av.returns.insert((s, a), Default::default());
            }
        }

        av
    }

    /// First-visit update from one episode, scanning backwards. A pair already
    /// updated during this scan is skipped, so it gets the return of its latest
    /// occurrence. `on_update` runs right after each Q entry changes. Returns the
    /// number of pairs updated.
    pub fn update(
        &mut self,
        ep: &Episode<S, A>,
        gamma: f64,
        mut on_update: impl FnMut(S, &ValueTable<(S, A)>),
    ) -> usize {
        let ev = &ep.events;
        let mut visited = HashSet::new();
        let mut g = 0.;
        let mut updated = 0;
        for t in (0..ev.len().saturating_sub(1)).rev() {
            g = gamma * g + ev[t + 1].r;
            let Some(a) = ev[t].a else {
                continue;
            };
            let s = ev[t].s;
            if !visited.insert((s, a)) {
                continue;
            }

            let mean = self.returns.push((s, a), g);
            self.q.set((s, a), mean);
            on_update(s, &self.q);
            updated += 1;
        }

        updated
    }
}

/// Monte Carlo prediction and control over a model that is only sampled.
pub struct MonteCarlo<'a, M: Mdp> {
    mdp: &'a M,
    gamma: f64,
    start: Start<M::State>,
    options: EpisodeOptions,
    values: ActionValues<M::State, M::Action>,
}

impl<'a, M: Mdp> MonteCarlo<'a, M> {
    pub fn new(mdp: &'a M, gamma: f64, start: Start<M::State>) -> Self {
        Self {
            mdp,
            gamma,
            start,
            options: EpisodeOptions::default(),
            values: ActionValues::zeros(mdp),
        }
    }

    pub fn with_options(mut self, options: EpisodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Resumes from previously accumulated estimates.
    pub fn with_values(mut self, values: ActionValues<M::State, M::Action>) -> Self {
        self.values = values;
        self
    }

    pub fn values(&self) -> &ActionValues<M::State, M::Action> {
        &self.values
    }

    pub fn into_values(self) -> ActionValues<M::State, M::Action> {
        self.values
    }

    fn rollout<P>(
        &self,
        policy: &P,
        ctx: &mut SimulationContext<M::State>,
        start: Start<M::State>,
        options: EpisodeOptions,
    ) -> Option<Episode<M::State, M::Action>>
    where
        P: Policy<M::State, M::Action>,
    {
        if !reset(self.mdp, ctx, start) {
            warn!("no non-terminal state to start from");
            return None;
        }

        Some(play_episode(self.mdp, policy, ctx, options))
    }

    /// First-visit prediction of Q under a fixed `policy`.
    pub fn evaluate<P>(&mut self, policy: &P, ctx: &mut SimulationContext<M::State>, n_ep: usize)
    where
        P: Policy<M::State, M::Action>,
    {
        for i in 0..n_ep {
            log_progress(i, n_ep);
            let Some(ep) = self.rollout(policy, ctx, self.start, self.options) else {
                return;
            };
            self.values.update(&ep, self.gamma, |_, _| {});
        }
    }

    /// First-visit prediction of V under a fixed `policy`. Leaves the Q
    /// estimates untouched.
    pub fn state_values<P>(
        &self,
        policy: &P,
        ctx: &mut SimulationContext<M::State>,
        n_ep: usize,
    ) -> ValueTable<M::State>
    where
        P: Policy<M::State, M::Action>,
    {
        let rollouts = &mut PolicyRollouts {
            mdp: self.mdp,
            policy,
            ctx,
            start: self.start,
            options: self.options,
        };

        mc_first_visit(rollouts, self.gamma, n_ep)
    }

    /// Exploring starts: random non-terminal start, random first action, then
    /// the greedy `policy`, which is refreshed after every Q update.
    pub fn exploring_starts(
        &mut self,
        policy: &mut DeterministicPolicy<M::State, M::Action>,
        ctx: &mut SimulationContext<M::State>,
        n_ep: usize,
    ) {
        let mdp = self.mdp;
        let options = EpisodeOptions {
            exploring_start: true,
            ..self.options
        };

        for i in 0..n_ep {
            log_progress(i, n_ep);
            let Some(ep) = self.rollout(&*policy, ctx, Start::RandomNonTerminal, options) else {
                return;
            };
            self.values.update(&ep, self.gamma, |s, q| {
                if let Some(a) = greedy(q, s, mdp.actions(s)) {
                    policy.set(s, a);
                }
            });
        }
    }

    /// On-policy control with an epsilon-soft `policy`, refreshed after every Q
    /// update.
    pub fn epsilon_greedy(
        &mut self,
        policy: &mut StochasticPolicy<M::State, M::Action>,
        epsilon: f64,
        ctx: &mut SimulationContext<M::State>,
        n_ep: usize,
    ) {
        let mdp = self.mdp;

        for i in 0..n_ep {
            log_progress(i, n_ep);
            let Some(ep) = self.rollout(&*policy, ctx, self.start, self.options) else {
                return;
            };
            self.values.update(&ep, self.gamma, |s, q| {
                policy.set(s, epsilon_greedy(q, s, mdp.actions(s), epsilon));
            });
        }
    }
}

fn log_progress(i: usize, n_ep: usize) {
    if i % 1000 == 0 {
        info!("episode {i}/{n_ep}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::grid_world::{standard_grid, standard_sticky_grid, Action, Cell};
    use crate::mdps::episode::EpisodeEvent;
    use crate::mdps::solvers::value_iteration::ValueIteration;
    use crate::mdps::solvers::MdpSolver;
    use float_eq::*;
    use rand::prelude::*;

    struct SimpleEnv {
        pub episodes: Vec<Episode<usize, ()>>,
    }

    impl EpisodeGenerator<usize, ()> for SimpleEnv {
        fn generate(&mut self, _n: usize) -> Vec<Episode<usize, ()>> {
            self.episodes.clone()
        }
    }

    fn toy(events: &[(usize, f64)]) -> Episode<usize, ()> {
        events
            .iter()
            .map(|&(s, r)| EpisodeEvent { s, a: Some(()), r })
            .collect::<Vec<_>>()
            .into()
    }

    fn toy_env() -> SimpleEnv {
        SimpleEnv {
            episodes: vec![
                toy(&[(1, -3.), (4, -2.), (1, -1.), (2, -3.), (1, -1.)]),
                toy(&[(1, -3.), (4, -0.)]),
                toy(&[(2, -3.), (4, -0.)]),
            ],
        }
    }

    #[test]
    fn toy_example_with_first_vist() {
        let v = mc_first_visit(&mut toy_env(), 0.9, 3);

        assert_float_eq!(v.get(0), 0., abs <= 1e-5);
        // State 1 repeats in the first episode; its latest occurrence counts.
        assert_float_eq!(v.get(1), -3.9 / 2.0, abs <= 1e-5);
        assert_float_eq!(v.get(2), -1. / 2.0, abs <= 1e-5);
        assert_float_eq!(v.get(3), 0., abs <= 1e-5);
        assert_float_eq!(v.get(4), -4.51, abs <= 1e-5);
        assert_float_eq!(v.get(5), 0., abs <= 1e-5);
    }

    #[test]
    fn toy_example_with_every_vist() {
        let v = mc_every_visit(&mut toy_env(), 0.9, 3);

        assert_float_eq!(v.get(1), (-6.059 + -3.0 + -0.9) / 3.0, abs <= 1e-5);
        assert_float_eq!(v.get(2), -1. / 2.0, abs <= 1e-5);
        assert_float_eq!(v.get(4), -4.51, abs <= 1e-5);
    }

    #[test]
    fn repeated_pairs_count_once_per_episode() {
        let (s, t) = (Cell::new(2, 0), Cell::new(2, 1));
        let ep: Episode<_, _> = vec![
            EpisodeEvent { s, a: Some(Action::Right), r: 0. },
            EpisodeEvent { s: t, a: Some(Action::Left), r: -0.1 },
            EpisodeEvent { s, a: Some(Action::Right), r: -0.1 },
            EpisodeEvent { s: t, a: Some(Action::Left), r: -0.1 },
        ]
        .into();

        let av = &mut ActionValues::new();
        let mut calls = vec![];
        let updated = av.update(&ep, 0.9, |s, _| calls.push(s));

        // The last event has no successor and is never updated.
        assert_eq!(updated, 2);
        assert_eq!(calls, vec![s, t]);
        assert_eq!(av.returns.count((s, Action::Right)), 1);
        assert_eq!(av.returns.count((t, Action::Left)), 1);
        // G_2 = -0.1 for the repeat of (s, R) at t = 2; t = 0 is skipped.
        assert_float_eq!(av.q.get((s, Action::Right)), -0.1, abs <= 1e-12);
        // G_1 = -0.1 + 0.9 * -0.1
        assert_float_eq!(av.q.get((t, Action::Left)), -0.19, abs <= 1e-12);
    }

    #[test]
    fn rollouts_of_a_fixed_policy_give_state_values() {
        let gw = standard_grid(-0.1);
        let vi = &mut ValueIteration::new(&gw, 0.9);
        vi.exec(1e-6, None);
        let pi = vi.policy();

        let ctx = &mut SimulationContext::new(gw.start(), 2718);
        let rollouts = &mut PolicyRollouts {
            mdp: &gw,
            policy: &pi,
            ctx,
            start: Start::Fixed(gw.start()),
            options: EpisodeOptions::default(),
        };
        let eps = rollouts.generate(3);
        assert_eq!(eps.len(), 3);
        assert!(eps.iter().all(|ep| ep.terminated() && ep.events[0].s == gw.start()));

        let ctx = &mut SimulationContext::new(gw.start(), 2718);
        let mc = MonteCarlo::new(&gw, 0.9, Start::RandomNonTerminal);
        let v = mc.state_values(&pi, ctx, 500);
        for s in gw.non_terminal_states() {
            assert_float_eq!(v.get(s), vi.v_star(s), abs <= 1e-6);
        }
        // Q is not touched by state prediction.
        assert!(mc.values().returns.iter().all(|(_, m)| m.count == 0));
    }

    #[test]
    fn sentinel_is_never_updated() {
        let ep: Episode<_, _> = vec![
            EpisodeEvent { s: Cell::new(0, 2), a: Some(Action::Right), r: 0. },
            EpisodeEvent { s: Cell::new(0, 3), a: None, r: 1. },
        ]
        .into();

        let av = &mut ActionValues::new();
        assert_eq!(av.update(&ep, 0.9, |_, _| {}), 1);
        assert_eq!(av.q.get((Cell::new(0, 2), Action::Right)), 1.);
        assert_eq!(av.returns.len(), 1);
    }

    #[test]
    fn prediction_matches_the_model_for_a_fixed_policy() {
        let gw = standard_grid(-0.1);
        let vi = &mut ValueIteration::new(&gw, 0.9);
        vi.exec(1e-6, None);
        let pi = vi.policy();

        let n_ep = 2000;
        let mc = &mut MonteCarlo::new(&gw, 0.9, Start::RandomNonTerminal);
        let ctx = &mut SimulationContext::new(gw.start(), 2718);
        mc.evaluate(&pi, ctx, n_ep);

        for s in gw.non_terminal_states() {
            let a = pi.get(s).unwrap();
            assert!(mc.values().returns.count((s, a)) > 0);
            assert_float_eq!(
                mc.values().q.get((s, a)),
                vi.q_star(s, a).unwrap(),
                abs <= 1e-6
            );
        }
        for (_, m) in mc.values().returns.iter() {
            assert!(m.count <= n_ep);
        }
        assert_eq!(&pi, &vi.policy());
    }

    #[test]
    fn exploring_starts_finds_the_obvious_moves() {
        let gw = standard_grid(-0.1);
        let ctx = &mut SimulationContext::new(gw.start(), 2718);
        let policy = &mut DeterministicPolicy::random(&gw, ctx.rng());

        let n_ep = 10_001;
        let mc = &mut MonteCarlo::new(&gw, 0.9, Start::RandomNonTerminal);
        mc.exploring_starts(policy, ctx, n_ep);

        assert_eq!(policy.get(Cell::new(0, 2)), Some(Action::Right));
        assert_eq!(policy.get(Cell::new(1, 2)), Some(Action::Up));
        assert_eq!(policy.get(Cell::new(2, 3)), Some(Action::Left));
        for (s, a) in policy.iter() {
            assert!(gw.actions(s).contains(&a));
        }
        for (_, m) in mc.values().returns.iter() {
            assert!(m.count <= n_ep);
        }
    }

    #[test]
    fn epsilon_greedy_keeps_soft_policies() {
        let gw = standard_sticky_grid(-0.09);
        let policy = &mut StochasticPolicy::uniform(&gw);
        let ctx = &mut SimulationContext::new(gw.start(), 2718);

        let mc = &mut MonteCarlo::new(&gw, 0.9, Start::Fixed(gw.start()));
        mc.epsilon_greedy(policy, 0.1, ctx, 5000);

        for (s, d) in policy.iter() {
            assert_eq!(d.len(), gw.actions(s).len());
            assert_float_eq!(d.iter().map(|(_, p)| p).sum::<f64>(), 1., abs <= 1e-9);
            assert!(d.iter().all(|&(_, p)| p >= 0.1 / d.len() as f64 - 1e-12));
        }
        assert_eq!(policy.greedy_action(Cell::new(0, 2)), Some(Action::Right));
    }
}

use super::mdp::Mdp;
use super::mdp_simulator::SimulationContext;
use super::policy::Policy;
use log::warn;
use rand::prelude::*;

/// One `(s_t, a_t, r_t)` entry of a trajectory.
///
/// `r` is the reward received on entering `s`, so the first event carries 0.
/// `a == None` is the end-of-episode sentinel on a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeEvent<S, A> {
    pub s: S,
    pub a: Option<A>,
    pub r: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode<S, A> {
    pub events: Vec<EpisodeEvent<S, A>>,
}

impl<S, A> Episode<S, A> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the rollout reached a terminal state, as opposed to hitting the
    /// step cap.
    pub fn terminated(&self) -> bool {
        self.events.last().is_some_and(|e| e.a.is_none())
    }
}

impl<S, A> From<Vec<EpisodeEvent<S, A>>> for Episode<S, A> {
    fn from(events: Vec<EpisodeEvent<S, A>>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Start<S> {
    Fixed(S),
    RandomNonTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOptions {
    /// Maximum number of transitions before the rollout is truncated.
    pub max_steps: usize,
    /// Draw the first action uniformly from the legal set.
    pub exploring_start: bool,
}

impl Default for EpisodeOptions {
    fn default() -> Self {
        Self {
            max_steps: 20,
            exploring_start: false,
        }
    }
}

/// Places the cursor according to `start`. Returns `false` if the model has no
/// state to start from.
pub fn reset<M: Mdp>(mdp: &M, ctx: &mut SimulationContext<M::State>, start: Start<M::State>) -> bool {
    match start {
        Start::Fixed(s) => {
            ctx.reset(s);
            true
        }
        Start::RandomNonTerminal => match mdp.non_terminal_states().choose(ctx.rng()) {
            Some(&s) => {
                ctx.reset(s);
                true
            }
            None => false,
        },
    }
}

/// Rolls out `policy` from the cursor of `ctx` until a terminal state or
/// `options.max_steps` transitions.
pub fn play_episode<M, P>(
    mdp: &M,
    policy: &P,
    ctx: &mut SimulationContext<M::State>,
    options: EpisodeOptions,
) -> Episode<M::State, M::Action>
where
    M: Mdp,
    P: Policy<M::State, M::Action>,
{
    let mut events = Vec::with_capacity(options.max_steps + 1);
    let mut r = 0.;

    for step in 0..options.max_steps {
        let s = ctx.state();
        if mdp.is_terminal(s) {
            break;
        }

        let a = if step == 0 && options.exploring_start {
            mdp.actions(s).choose(ctx.rng()).copied()
        } else {
            policy.action(s, ctx.rng())
        };
        let Some(a) = a else {
            warn!("policy has no action for {s:?}, truncating episode");
            return events.into();
        };

        events.push(EpisodeEvent { s, a: Some(a), r });
        (r, _) = ctx.step(mdp, a);
    }

    let s = ctx.state();
    if mdp.is_terminal(s) {
        events.push(EpisodeEvent { s, a: None, r });
    }

    events.into()
}

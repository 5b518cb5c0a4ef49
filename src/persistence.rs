//! Versioned JSON snapshots of grid worlds and agents.

use crate::envs::grid_world::{Action, Cell, Deterministic, Grid, GridWorld, Slippery};
use crate::mdps::policy::{DeterministicPolicy, StochasticPolicy};
use crate::mdps::solvers::mc_methods::ActionValues;
use crate::mdps::value_table::{RunningMean, ValueTable};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

fn check_version(found: u32) -> Result<()> {
    if found != SNAPSHOT_VERSION {
        return Err(Error::UnsupportedVersion {
            found,
            expected: SNAPSHOT_VERSION,
        });
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub from: Cell,
    pub action: Action,
    pub to: Vec<(Cell, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub version: u32,
    pub rows: usize,
    pub cols: usize,
    pub start: Cell,
    pub actions: Vec<(Cell, Vec<Action>)>,
    pub rewards: Vec<(Cell, f64)>,
    /// Absent for deterministic worlds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Vec<TransitionRow>>,
}

/// Dynamics that can be written to and rebuilt from a snapshot.
pub trait PersistDynamics: Sized {
    fn to_rows(&self) -> Option<Vec<TransitionRow>>;

    fn from_rows(rows: Option<Vec<TransitionRow>>) -> Result<Self>;
}

impl PersistDynamics for Deterministic {
    fn to_rows(&self) -> Option<Vec<TransitionRow>> {
        None
    }

    fn from_rows(rows: Option<Vec<TransitionRow>>) -> Result<Self> {
        match rows {
            None => Ok(Deterministic),
            Some(_) => Err(Error::InvalidConfiguration {
                message: "snapshot holds a transition table, expected a deterministic world".into(),
            }),
        }
    }
}

impl PersistDynamics for Slippery {
    fn to_rows(&self) -> Option<Vec<TransitionRow>> {
        let mut rows = self
            .iter()
            .map(|((from, action), to)| TransitionRow {
                from,
                action,
                to: to.to_vec(),
            })
            .collect::<Vec<_>>();
        rows.sort_by_key(|r| (r.from, r.action));

        Some(rows)
    }

    fn from_rows(rows: Option<Vec<TransitionRow>>) -> Result<Self> {
        let rows = rows.ok_or_else(|| Error::InvalidConfiguration {
            message: "snapshot has no transition table".into(),
        })?;

        let dynamics = Slippery::new(
            rows.into_iter()
                .map(|r| ((r.from, r.action), r.to))
                .collect(),
        );
        dynamics.validate()?;

        Ok(dynamics)
    }
}

impl<D: PersistDynamics> GridWorld<D> {
    pub fn snapshot(&self) -> GridSnapshot {
        let grid = self.grid();

        let mut actions = grid
            .actions
            .iter()
            .map(|(&c, a)| (c, a.clone()))
            .collect::<Vec<_>>();
        actions.sort_by_key(|(c, _)| *c);

        let mut rewards = grid.rewards.iter().map(|(&c, &r)| (c, r)).collect::<Vec<_>>();
        rewards.sort_by_key(|(c, _)| *c);

        GridSnapshot {
            version: SNAPSHOT_VERSION,
            rows: grid.rows,
            cols: grid.cols,
            start: grid.start,
            actions,
            rewards,
            transitions: self.dynamics().to_rows(),
        }
    }

    pub fn from_snapshot(snapshot: GridSnapshot) -> Result<Self> {
        check_version(snapshot.version)?;

        let mut grid = Grid::new(snapshot.rows, snapshot.cols, snapshot.start);
        grid.set_config(
            snapshot.actions.into_iter().collect(),
            snapshot.rewards.into_iter().collect(),
        );

        Ok(GridWorld::new(grid, D::from_rows(snapshot.transitions)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValueEntry<S, A> {
    pub state: S,
    pub action: A,
    pub q: f64,
    /// Running mean of the observed returns, if any were observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<RunningMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicySnapshot<S, A> {
    Deterministic(Vec<(S, A)>),
    Stochastic(Vec<(S, Vec<(A, f64)>)>),
}

/// Everything an agent learned: V, Q with its running means, and the policy.
/// Entries are sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>, A: Deserialize<'de>"))]
pub struct AgentSnapshot<S, A> {
    pub version: u32,
    pub gamma: f64,
    #[serde(default)]
    pub values: Vec<(S, f64)>,
    #[serde(default)]
    pub action_values: Vec<ActionValueEntry<S, A>>,
    #[serde(default)]
    pub policy: Option<PolicySnapshot<S, A>>,
}

impl<S, A> AgentSnapshot<S, A>
where
    S: Copy + Eq + Hash + Ord,
    A: Copy + Eq + Hash + Ord,
{
    pub fn new(gamma: f64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            gamma,
            values: vec![],
            action_values: vec![],
            policy: None,
        }
    }

    pub fn with_values(mut self, v: &ValueTable<S>) -> Self {
        self.values = v.iter().collect();
        self.values.sort_by_key(|(s, _)| *s);
        self
    }

    pub fn with_action_values(mut self, av: &ActionValues<S, A>) -> Self {
        let mut keys = av.q.iter().map(|(k, _)| k).collect::<Vec<_>>();
        keys.extend(av.returns.iter().map(|(k, _)| k).filter(|&k| !av.q.contains(k)));
        keys.sort();

        self.action_values = keys
            .into_iter()
            .map(|(state, action)| ActionValueEntry {
                state,
                action,
                q: av.q.get((state, action)),
                returns: av.returns.get((state, action)).copied(),
            })
            .collect();
        self
    }

    pub fn with_deterministic_policy(mut self, pi: &DeterministicPolicy<S, A>) -> Self {
        let mut entries = pi.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(s, _)| *s);
        self.policy = Some(PolicySnapshot::Deterministic(entries));
        self
    }

    pub fn with_stochastic_policy(mut self, pi: &StochasticPolicy<S, A>) -> Self {
        let mut entries = pi.iter().map(|(s, d)| (s, d.to_vec())).collect::<Vec<_>>();
        entries.sort_by_key(|(s, _)| *s);
        self.policy = Some(PolicySnapshot::Stochastic(entries));
        self
    }

    pub fn values(&self) -> ValueTable<S> {
        self.values.iter().copied().collect()
    }

    pub fn action_values(&self) -> ActionValues<S, A> {
        let mut av = ActionValues::new();
        for e in &self.action_values {
            av.q.set((e.state, e.action), e.q);
            if let Some(m) = e.returns {
                av.returns.insert((e.state, e.action), m);
            }
        }

        av
    }

    pub fn deterministic_policy(&self) -> Option<DeterministicPolicy<S, A>> {
        match &self.policy {
            Some(PolicySnapshot::Deterministic(entries)) => Some(entries.iter().copied().collect()),
            _ => None,
        }
    }

    pub fn stochastic_policy(&self) -> Option<StochasticPolicy<S, A>> {
        match &self.policy {
            Some(PolicySnapshot::Stochastic(entries)) => {
                let mut pi = StochasticPolicy::new();
                for (s, d) in entries {
                    pi.set(*s, d.clone());
                }
                Some(pi)
            }
            _ => None,
        }
    }
}

pub fn to_writer<T: Serialize>(value: &T, writer: impl Write) -> Result<()> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn from_reader<T: DeserializeOwned>(reader: impl Read) -> Result<T> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn save<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(format!("create {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    to_writer(value, &mut writer)?;
    writer
        .flush()
        .map_err(|e| Error::io(format!("write {}", path.display()), e))
}

pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
    from_reader(BufReader::new(file))
}

pub fn save_env<D: PersistDynamics>(gw: &GridWorld<D>, path: impl AsRef<Path>) -> Result<()> {
    save(&gw.snapshot(), path)
}

pub fn load_env<D: PersistDynamics>(path: impl AsRef<Path>) -> Result<GridWorld<D>> {
    GridWorld::from_snapshot(load(path)?)
}

pub fn save_agent<S, A>(agent: &AgentSnapshot<S, A>, path: impl AsRef<Path>) -> Result<()>
where
    S: Serialize,
    A: Serialize,
{
    save(agent, path)
}

pub fn load_agent<S, A>(path: impl AsRef<Path>) -> Result<AgentSnapshot<S, A>>
where
    S: DeserializeOwned,
    A: DeserializeOwned,
{
    let agent: AgentSnapshot<S, A> = load(path)?;
    check_version(agent.version)?;

    Ok(agent)
}

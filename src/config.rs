use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hyperparameters of a batch run. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discount factor.
    pub gamma: f64,
    /// Convergence threshold on the per-sweep value change.
    pub theta: f64,
    /// Reward of every ordinary cell.
    pub cost: f64,
    pub max_sweeps: usize,
    pub evaluation_iterations: usize,
    pub policy_iterations: usize,
    pub episodes: usize,
    pub max_steps: usize,
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            theta: 1e-3,
            cost: -0.1,
            max_sweeps: 1000,
            evaluation_iterations: 100,
            policy_iterations: 10,
            episodes: 10_001,
            max_steps: 20,
            epsilon: 0.1,
            seed: 2718,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read config {}", path.display()), e))?;
        let config = serde_json::from_str::<Self>(&data)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(Error::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("gamma must be in [0, 1]");
        }
        if self.theta <= 0. {
            return invalid("theta must be positive");
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return invalid("epsilon must be in [0, 1]");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be at least 1");
        }

        Ok(())
    }
}

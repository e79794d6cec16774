//! # fermrl
//!
//! Entry point for training feeding and temperature/pH policies on a
//! simulated mixed-culture fermentation.
//!
//! The workspace is layered leaf-first:
//!
//! -   **[`kinetics`]:** the kinetic ODE model of competing populations and
//!     the fixed-step integrator that advances it.
//! -   **[`bioreactor`]:** wraps the model as a steppable decision process
//!     with bounded actions, feasibility checks and a weighted reward.
//! -   **[`ml`]:** the environment contract, small dense networks and the
//!     agents (a Gaussian actor-critic and a fixed-action baseline).
//! -   **[`rl`]:** the training loop, run statistics and parallel episode
//!     collection.
//!
//! This crate adds a JSON run configuration and the `fermrl` binary.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;

use std::path::Path;

use anyhow::{Context, Result};
use bioreactor::EnvConfig;
use ml::ActorCriticConfig;
use rl::TrainerConfig;
use serde::{Deserialize, Serialize};

pub use bioreactor;
pub use kinetics;
pub use ml;
pub use rl;

/// Everything one training session needs. Missing sections take their
/// defaults, so `{}` is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub env: EnvConfig,
    pub agent: ActorCriticConfig,
    pub trainer: TrainerConfig,
}

impl RunConfig {
    /// # Errors
    ///
    /// Malformed JSON or a field of the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse run configuration")
    }

    /// # Errors
    ///
    /// The file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Uses one seed for the environment, the agent's initialization and
    /// the episode sequence.
    pub fn reseed(&mut self, seed: u64) {
        self.env.seed = seed;
        self.agent.seed = seed;
        self.trainer.seed = seed;
    }
}

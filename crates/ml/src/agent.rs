//! Agent capability set shared by every controller implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transition::Transition;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Stochastic actions; updates allowed.
    #[default]
    Training,
    /// Deterministic actions; updates rejected.
    Evaluation,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("invalid agent configuration `{field}`: {reason}")]
    Config { field: String, reason: String },
    #[error("update called in evaluation mode")]
    UpdateInEvaluation,
    #[error("non-finite parameters after update {update}")]
    Divergence { update: u64 },
    #[error("update called with an empty batch")]
    EmptyBatch,
    #[error("observation has {actual} values, expected {expected}")]
    ObservationSize { expected: usize, actual: usize },
    #[error("action has {actual} values, expected {expected}")]
    ActionSize { expected: usize, actual: usize },
}

impl AgentError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Diagnostics of one [`Agent::update`] call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMetrics {
    /// 1-based index of the update that produced these metrics.
    pub update: u64,
    pub policy_loss: f64,
    pub value_loss: f64,
    pub entropy: f64,
    /// Global gradient norm before clipping.
    pub grad_norm: f64,
    pub mean_advantage: f64,
    pub batch_size: usize,
}

/// A controller that maps observations to actions and learns from batches
/// of transitions.
pub trait Agent {
    /// Proposes an action for `observation`. In [`Mode::Evaluation`] the
    /// result does not depend on `rng`.
    fn act(&self, observation: &[f64], rng: &mut fastrand::Rng) -> Vec<f64>;

    /// Learns from `batch`. Parameters change only if the whole update
    /// succeeds.
    ///
    /// # Errors
    ///
    /// [`AgentError::UpdateInEvaluation`] in evaluation mode,
    /// [`AgentError::EmptyBatch`] for an empty batch, size errors for
    /// malformed transitions, [`AgentError::Divergence`] when the update
    /// would produce non-finite parameters.
    fn update(&mut self, batch: &[Transition]) -> Result<UpdateMetrics, AgentError>;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn name(&self) -> &str;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn act(&self, observation: &[f64], rng: &mut fastrand::Rng) -> Vec<f64> {
        (**self).act(observation, rng)
    }

    fn update(&mut self, batch: &[Transition]) -> Result<UpdateMetrics, AgentError> {
        (**self).update(batch)
    }

    fn mode(&self) -> Mode {
        (**self).mode()
    }

    fn set_mode(&mut self, mode: Mode) {
        (**self).set_mode(mode);
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

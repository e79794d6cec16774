//! Run statistics: per-episode summaries, optional step records and the
//! final report.

use std::collections::VecDeque;

use ml::{EpisodeEnd, UpdateMetrics};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    /// Undiscounted sum of rewards.
    pub episode_return: f64,
    /// Steps taken.
    pub length: usize,
    /// `None` when the episode was interrupted before it ended.
    pub end: Option<EpisodeEnd>,
    pub abnormal: bool,
    /// Stopped early by a cancellation request.
    pub interrupted: bool,
    /// Agent updates performed during the episode.
    pub updates: usize,
    /// Moving average of returns up to and including this episode.
    pub moving_average: Option<f64>,
}

/// One environment step, for tabular export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub episode: usize,
    /// 1-based step index within the episode.
    pub step: usize,
    /// Simulated time after the step.
    pub time: f64,
    /// Process state after the step.
    pub state: Vec<f64>,
    /// The action the agent proposed.
    pub action: Vec<f64>,
    pub reward: f64,
}

impl StepRecord {
    /// Column names matching [`StepRecord::to_row`].
    #[must_use]
    pub fn header<S: AsRef<str>, T: AsRef<str>>(state_labels: &[S], action_labels: &[T]) -> Vec<String> {
        let mut header = vec!["episode".to_string(), "step".to_string(), "time".to_string()];
        header.extend(state_labels.iter().map(|s| s.as_ref().to_string()));
        header.extend(action_labels.iter().map(|a| a.as_ref().to_string()));
        header.push("reward".to_string());
        header
    }

    /// `[episode, step, time, state.., action.., reward]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(4 + self.state.len() + self.action.len());
        row.push(self.episode as f64);
        row.push(self.step as f64);
        row.push(self.time);
        row.extend_from_slice(&self.state);
        row.extend_from_slice(&self.action);
        row.push(self.reward);
        row
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    #[error("agent diverged at update {update}")]
    Divergence { update: u64 },
    #[error("agent error: {message}")]
    Agent { message: String },
    #[error("{reason}")]
    Numerical { reason: String },
}

/// An error that stopped the run, located by episode and step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
#[error("episode {episode}, step {step}: {kind}")]
pub struct FatalFailure {
    pub episode: usize,
    pub step: usize,
    pub kind: FailureKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Outcome {
    /// Every requested episode ran.
    #[default]
    Completed,
    /// The moving-average return settled.
    Converged { episode: usize },
    Cancelled,
    Failed(FatalFailure),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub outcome: Outcome,
    /// Finished (or interrupted) episodes in order.
    pub episodes: Vec<EpisodeSummary>,
    pub updates: Vec<UpdateMetrics>,
    /// Filled only when step recording is enabled.
    pub steps: Vec<StepRecord>,
    pub abnormal_episodes: usize,
    pub total_steps: usize,
}

impl TrainingReport {
    #[must_use]
    pub fn returns(&self) -> Vec<f64> {
        self.episodes.iter().map(|e| e.episode_return).collect()
    }

    #[must_use]
    pub fn best_return(&self) -> Option<f64> {
        self.episodes.iter().map(|e| e.episode_return).reduce(f64::max)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FatalFailure> {
        match &self.outcome {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Mean over the most recent `window` values.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    /// # Panics
    ///
    /// Panics if `window` is zero.
    #[must_use]
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "window must be positive");
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) -> f64 {
        if self.values.len() == self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.mean()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }
}

/// Stopping rule on episode returns: the run has converged once the
/// moving average over `window` episodes moves by less than `tolerance` for
/// `patience` consecutive episodes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub window: usize,
    pub tolerance: f64,
    pub patience: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct ConvergenceTracker {
    rule: Convergence,
    average: MovingAverage,
    previous: Option<f64>,
    stable: usize,
}

impl ConvergenceTracker {
    pub(crate) fn new(rule: Convergence) -> Self {
        Self {
            average: MovingAverage::new(rule.window),
            rule,
            previous: None,
            stable: 0,
        }
    }

    /// Records one return; `true` once the rule is satisfied.
    pub(crate) fn observe(&mut self, episode_return: f64) -> bool {
        let mean = self.average.push(episode_return);
        if !self.average.is_full() {
            return false;
        }
        match self.previous.replace(mean) {
            Some(previous) if (mean - previous).abs() < self.rule.tolerance => self.stable += 1,
            _ => self.stable = 0,
        }
        self.stable >= self.rule.patience
    }
}

//! Environment contract seen by agents and trainers.

use serde::{Deserialize, Serialize};

/// Reinforcement learning environment trait.
///
/// Inspired by classic frameworks like OpenAI Gym, this trait defines the core
/// interface an environment must provide. Each call to [`step`] advances the
/// simulation by one decision and returns the new observation vector, a reward
/// signal, and whether (and how) the episode ended.
///
/// Observation size and action bounds are fixed for the lifetime of an
/// instance.
///
/// [`step`]: Env::step
pub trait Env {
    /// Environment-specific diagnostics attached to every step.
    type Info;

    /// Reset the environment to a starting state and return the initial
    /// observation vector. A seed makes the starting state reproducible.
    fn reset(&mut self, seed: Option<u64>) -> Vec<f64>;

    /// Advance the environment by one action. Out-of-bounds actions are
    /// clipped, never rejected.
    fn step(&mut self, action: &[f64]) -> Step<Self::Info>;

    /// Size of the observation vector.
    fn observation_size(&self) -> usize;

    /// Per-dimension bounds of the action vector.
    fn action_bounds(&self) -> &[Bounds];

    /// Size of the action space.
    fn action_size(&self) -> usize {
        self.action_bounds().len()
    }
}

/// Step diagnostics that expose the simulated process, so trainers can
/// record trajectories without knowing the environment type.
pub trait Snapshot {
    /// Simulated time at the end of the step.
    fn time(&self) -> f64;

    /// Full process state at the end of the step.
    fn state(&self) -> &[f64];
}

impl Snapshot for () {
    fn time(&self) -> f64 {
        0.0
    }

    fn state(&self) -> &[f64] {
        &[]
    }
}

/// How an episode ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EpisodeEnd {
    /// Time limit reached; the state itself is not terminal.
    Truncated,
    /// The process reached a terminal state.
    Terminal { reason: String },
    /// The simulation failed; the episode cannot continue.
    Abnormal { reason: String },
}

#[derive(Clone, Debug)]
pub struct Step<I> {
    pub observation: Vec<f64>,
    pub reward: f64,
    /// `None` while the episode is running.
    pub end: Option<EpisodeEnd>,
    pub info: I,
}

impl<I> Step<I> {
    #[must_use]
    pub fn done(&self) -> bool {
        self.end.is_some()
    }

    #[must_use]
    pub fn truncated(&self) -> bool {
        matches!(self.end, Some(EpisodeEnd::Truncated))
    }

    #[must_use]
    pub fn abnormal(&self) -> bool {
        matches!(self.end, Some(EpisodeEnd::Abnormal { .. }))
    }
}

/// Closed interval `[low, high]` for one action or state component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// A degenerate interval holding a single value.
    #[must_use]
    pub const fn fixed(value: f64) -> Self {
        Self { low: value, high: value }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    #[must_use]
    pub fn mid(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    #[must_use]
    pub fn half_range(&self) -> f64 {
        0.5 * (self.high - self.low)
    }

    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        (self.low..=self.high).contains(&x)
    }

    /// Clamps `x` into the interval; NaN maps to the midpoint.
    #[must_use]
    pub fn clip(&self, x: f64) -> f64 {
        if x.is_nan() {
            self.mid()
        } else {
            x.clamp(self.low, self.high)
        }
    }

    /// Maps `u` in `[-1, 1]` onto the interval.
    #[must_use]
    pub fn denormalize(&self, u: f64) -> f64 {
        self.half_range().mul_add(u, self.mid())
    }

    /// Maps a value of the interval onto `[-1, 1]`; degenerate intervals map
    /// everything to `0`.
    #[must_use]
    pub fn normalize(&self, x: f64) -> f64 {
        let half = self.half_range();
        if half > 0.0 {
            (x - self.mid()) / half
        } else {
            0.0
        }
    }
}

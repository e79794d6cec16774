//! # Fermentation Environment
//!
//! A fed-batch reactor as a Markov decision process. Each decision applies
//! one control (feed rate, temperature, pH) for `decision_interval` hours of
//! simulated time, integrated with the configured scheme and sub-step.
//!
//! Proposed actions are clipped to their bounds before they reach the
//! model. The clipped amount is reported in [`StepInfo`] and may be
//! penalized through the reward weights, but it is never an error.
//!
//! An episode ends when
//! - the decision counter reaches the horizon (a time-limit truncation),
//! - the state leaves the operating region (a terminal state), or
//! - integration fails (abnormal). The last valid state is kept.
//!
//! Stepping a finished episode returns a zero-reward step carrying the same
//! termination until the next `reset`.

use std::fmt;

use kinetics::{ConfigError, Control, Integrator, Kinetics, MixedCultureModel, StateLayout};
use ml::{rng, Bounds, EpisodeEnd, Env, Snapshot, Step};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EnvConfig;
use crate::observation::Observer;
use crate::reward::{RewardBreakdown, RewardFunction, RewardInputs};

/// Action labels in action-vector order.
pub const ACTION_LABELS: [&str; 3] = ["feed_rate", "temperature", "ph"];

/// Normalized clipping distance counted for one action dimension at most;
/// keeps the reward finite for infinite or NaN proposals.
const MAX_CLIP_EXCESS: f64 = 10.0;

/// Why an episode ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Termination {
    /// The decision budget is used up.
    Horizon,
    SubstrateDepleted,
    BiomassCollapse,
    VolumeOverflow,
    /// The integrator produced a non-finite state.
    NumericalFailure { substep: Option<usize>, reason: String },
}

impl Termination {
    #[must_use]
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::NumericalFailure { .. })
    }

    /// Left the operating region.
    #[must_use]
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::SubstrateDepleted | Self::BiomassCollapse | Self::VolumeOverflow)
    }

    #[must_use]
    pub fn episode_end(&self) -> EpisodeEnd {
        match self {
            Self::Horizon => EpisodeEnd::Truncated,
            Self::NumericalFailure { .. } => EpisodeEnd::Abnormal {
                reason: self.to_string(),
            },
            _ => EpisodeEnd::Terminal {
                reason: self.to_string(),
            },
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizon => write!(f, "horizon reached"),
            Self::SubstrateDepleted => write!(f, "substrate depleted"),
            Self::BiomassCollapse => write!(f, "biomass collapsed"),
            Self::VolumeOverflow => write!(f, "volume overflow"),
            Self::NumericalFailure { reason, .. } => write!(f, "numerical failure: {reason}"),
        }
    }
}

/// Diagnostics attached to every step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Simulated hours since reset.
    pub time: f64,
    /// Decisions taken since reset.
    pub step: usize,
    pub state: Vec<f64>,
    /// The control actually applied.
    pub control: Control,
    pub clipped: bool,
    /// Sum over dimensions of the normalized clipping distance.
    pub clip_amount: f64,
    /// The proposal had the wrong number of entries.
    pub malformed_action: bool,
    pub termination: Option<Termination>,
    pub breakdown: RewardBreakdown,
}

impl Snapshot for StepInfo {
    fn time(&self) -> f64 {
        self.time
    }

    fn state(&self) -> &[f64] {
        &self.state
    }
}

struct ClippedAction {
    control: Control,
    normalized: Vec<f64>,
    clip_amount: f64,
    clipped: bool,
    malformed: bool,
}

/// The fermentation MDP over any [`Kinetics`] model.
#[derive(Clone, Debug)]
pub struct FermentationEnv<K = MixedCultureModel> {
    config: EnvConfig,
    model: K,
    layout: StateLayout,
    integrator: Integrator,
    observer: Observer,
    reward: RewardFunction,
    action_bounds: Vec<Bounds>,
    rng: fastrand::Rng,
    state: Vec<f64>,
    time: f64,
    step: usize,
    finished: Option<Termination>,
}

impl FermentationEnv {
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid field.
    pub fn new(config: EnvConfig) -> Result<Self, ConfigError> {
        let model = MixedCultureModel::new(config.kinetics.clone()).map_err(|e| e.within("kinetics"))?;
        Self::with_model(config, model)
    }
}

impl<K: Kinetics> FermentationEnv<K> {
    /// Uses `model` in place of the one described by `config.kinetics`. The
    /// model's state layout must match the configuration's.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid configuration or a layout
    /// mismatch.
    pub fn with_model(config: EnvConfig, model: K) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = config.layout();
        if model.layout() != layout {
            return Err(ConfigError::new(
                "kinetics",
                format!("model has {} state components, configuration {}", model.dim(), layout.dim()),
            ));
        }
        let integrator = Integrator::new(config.integrator.clone()).map_err(|e| e.within("integrator"))?;
        let observer = Observer::new(&config);
        let mut env = Self {
            reward: RewardFunction::new(config.reward.clone()),
            action_bounds: config.actions.to_vec(),
            rng: fastrand::Rng::with_seed(config.seed),
            state: Vec::new(),
            time: 0.0,
            step: 0,
            finished: None,
            model,
            layout,
            integrator,
            observer,
            config,
        };
        env.initialize();
        Ok(env)
    }

    #[must_use]
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// The current process state.
    #[must_use]
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Decisions taken since reset.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step
    }

    #[must_use]
    pub fn termination(&self) -> Option<&Termination> {
        self.finished.as_ref()
    }

    #[must_use]
    pub fn state_labels(&self) -> Vec<String> {
        self.layout.labels(
            self.config.kinetics.species.iter().map(|s| s.name.as_str()),
            self.config.kinetics.substrates.iter().map(|s| s.name.as_str()),
        )
    }

    fn initialize(&mut self) {
        let ranges = self.config.initial.ranges();
        self.state = if self.config.initial.randomize {
            ranges.iter().map(|b| rng::uniform(&mut self.rng, b.low, b.high)).collect()
        } else {
            ranges.iter().map(Bounds::mid).collect()
        };
        self.time = 0.0;
        self.step = 0;
        self.finished = None;
    }

    fn observe(&mut self) -> Vec<f64> {
        self.observer.observe(&self.state, self.time, &mut self.rng)
    }

    fn clip(&self, action: &[f64]) -> ClippedAction {
        let malformed = action.len() != self.action_bounds.len();
        let mut applied = [0.0; Control::DIM];
        let mut normalized = Vec::with_capacity(Control::DIM);
        let mut clip_amount = 0.0;
        let mut clipped = malformed;
        for (k, bounds) in self.action_bounds.iter().enumerate() {
            let proposed = action.get(k).copied().unwrap_or_else(|| bounds.mid());
            let value = bounds.clip(proposed);
            if proposed != value {
                clipped = true;
                let half = bounds.half_range();
                let excess = if half > 0.0 {
                    (proposed - value).abs() / half
                } else {
                    (proposed - value).abs()
                };
                clip_amount += if excess.is_nan() { MAX_CLIP_EXCESS } else { excess.min(MAX_CLIP_EXCESS) };
            }
            applied[k] = value;
            normalized.push(bounds.normalize(value));
        }
        ClippedAction {
            control: Control::from_array(applied),
            normalized,
            clip_amount,
            clipped,
            malformed,
        }
    }

    fn feasibility_exit(&self) -> Option<Termination> {
        let limits = &self.config.feasibility;
        if self.state[self.layout.volume()] > limits.max_volume {
            Some(Termination::VolumeOverflow)
        } else if self.layout.total_biomass(&self.state) < limits.min_total_biomass {
            Some(Termination::BiomassCollapse)
        } else if self.layout.total_substrate(&self.state) < limits.min_total_substrate {
            Some(Termination::SubstrateDepleted)
        } else {
            None
        }
    }

    fn info(&self, action: &ClippedAction, breakdown: RewardBreakdown) -> StepInfo {
        StepInfo {
            time: self.time,
            step: self.step,
            state: self.state.clone(),
            control: action.control,
            clipped: action.clipped,
            clip_amount: action.clip_amount,
            malformed_action: action.malformed,
            termination: self.finished.clone(),
            breakdown,
        }
    }

    fn finished_step(&mut self, termination: Termination, action: &[f64]) -> Step<StepInfo> {
        warn!(%termination, "step called on a finished episode; call reset first");
        let clipped = self.clip(action);
        Step {
            observation: self.observe(),
            reward: 0.0,
            end: Some(termination.episode_end()),
            info: self.info(&clipped, RewardBreakdown::default()),
        }
    }
}

impl<K: Kinetics> Env for FermentationEnv<K> {
    type Info = StepInfo;

    fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        if let Some(seed) = seed {
            self.rng = fastrand::Rng::with_seed(seed);
        }
        self.initialize();
        self.observe()
    }

    fn step(&mut self, action: &[f64]) -> Step<StepInfo> {
        if let Some(termination) = self.finished.clone() {
            return self.finished_step(termination, action);
        }

        let applied = self.clip(action);
        if applied.clipped {
            debug!(
                step = self.step,
                proposed = ?action,
                applied = ?applied.control,
                clip_amount = applied.clip_amount,
                "action clipped to bounds"
            );
        }

        let interval = self.config.decision_interval;
        let before = self.state.clone();
        self.step += 1;
        let mut substrate_fed = 0.0;
        let termination = match self.integrator.advance(&self.model, &before, &applied.control, interval) {
            Ok(next) => {
                self.state = next;
                self.time += interval;
                let feed_concentration: f64 = self.config.kinetics.substrates.iter().map(|s| s.feed_concentration).sum();
                substrate_fed = applied.control.feed_rate * interval * feed_concentration;
                self.feasibility_exit()
                    .or_else(|| (self.step >= self.config.horizon).then_some(Termination::Horizon))
            }
            Err(err) => {
                warn!(step = self.step, error = %err, "integration failed; keeping last valid state");
                Some(Termination::NumericalFailure {
                    substep: err.substep(),
                    reason: err.to_string(),
                })
            }
        };

        let breakdown = self.reward.evaluate(&RewardInputs {
            layout: self.layout,
            before: &before,
            after: &self.state,
            duration: interval,
            normalized_action: &applied.normalized,
            clip_amount: applied.clip_amount,
            substrate_fed,
            infeasible: termination.as_ref().is_some_and(Termination::is_infeasible),
            failed: termination.as_ref().is_some_and(Termination::is_abnormal),
        });
        if let Some(t) = &termination {
            debug!(step = self.step, time = self.time, termination = %t, "episode finished");
        }
        self.finished = termination;

        Step {
            observation: self.observe(),
            reward: breakdown.total,
            end: self.finished.as_ref().map(Termination::episode_end),
            info: self.info(&applied, breakdown),
        }
    }

    fn observation_size(&self) -> usize {
        self.observer.size()
    }

    fn action_bounds(&self) -> &[Bounds] {
        &self.action_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> FermentationEnv {
        FermentationEnv::new(EnvConfig::default()).unwrap()
    }

    #[test]
    fn clip_reports_normalized_excess() {
        let env = env();
        let clipped = env.clip(&[0.1, 25.0, 2.0]);
        assert!(clipped.clipped);
        assert!(!clipped.malformed);
        assert_eq!(clipped.control, Control { feed_rate: 0.05, temperature: 25.0, ph: 3.0 });
        // (0.1 - 0.05) / 0.025 + (3.0 - 2.0) / 1.5
        assert!((clipped.clip_amount - (2.0 + 1.0 / 1.5)).abs() < 1e-12);
        assert_eq!(clipped.normalized, vec![1.0, 0.0, -1.0]);
    }

    #[test]
    fn malformed_action_uses_midpoints() {
        let env = env();
        let clipped = env.clip(&[0.01]);
        assert!(clipped.malformed && clipped.clipped);
        assert_eq!(clipped.control, Control { feed_rate: 0.01, temperature: 25.0, ph: 4.5 });
        assert_eq!(clipped.clip_amount, 0.0);
    }

    #[test]
    fn non_finite_action_keeps_reward_finite() {
        let mut env = env();
        env.reset(Some(1));
        let step = env.step(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        assert!(step.reward.is_finite());
        assert_eq!(step.info.clip_amount, 3.0 * MAX_CLIP_EXCESS);
    }

    #[test]
    fn termination_maps_to_episode_end() {
        assert_eq!(Termination::Horizon.episode_end(), EpisodeEnd::Truncated);
        assert!(matches!(Termination::VolumeOverflow.episode_end(), EpisodeEnd::Terminal { .. }));
        let failure = Termination::NumericalFailure { substep: Some(3), reason: "nan".into() };
        assert!(matches!(failure.episode_end(), EpisodeEnd::Abnormal { .. }));
        assert!(failure.is_abnormal() && !failure.is_infeasible());
    }
}

//! # Training Loop
//!
//! Drives one agent through episodes of one environment:
//!
//! 1. `reset` the environment with the episode seed,
//! 2. `act`, `step` and record the transition until the episode ends,
//! 3. hand transitions to the agent on the configured schedule,
//!
//! and repeats until the episode budget is spent, returns converge, a stop
//! is requested or a fatal failure occurs. A fatal failure ends the run at
//! once; episodes completed before it stay in the report as they were.

use ml::{Agent, AgentError, Env, EpisodeEnd, Mode, ReplayBuffer, Snapshot, Step, Transition, UpdateMetrics};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::metrics::{
    Convergence, ConvergenceTracker, EpisodeSummary, FailureKind, FatalFailure, MovingAverage, Outcome,
    StepRecord, TrainingReport,
};
use crate::stop::StopToken;

/// When the agent learns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSchedule {
    /// After every environment step.
    PerStep,
    /// After every `n` environment steps, counted across episodes.
    EveryNSteps(usize),
    /// Once at the end of each episode.
    #[default]
    PerEpisode,
}

/// Off-policy learning from a replay buffer instead of the most recent
/// transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub capacity: usize,
    /// Transitions sampled per update.
    pub batch_size: usize,
    /// Minimum buffer fill before the first update.
    pub warmup: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub episodes: usize,
    pub schedule: UpdateSchedule,
    pub replay: Option<ReplayConfig>,
    pub convergence: Option<Convergence>,
    /// Base seed; episode `k` resets the environment with `seed + k`.
    pub seed: u64,
    /// Keep a [`StepRecord`] for every step.
    pub record_trajectories: bool,
    /// Treat an abnormal episode end as fatal instead of skipping on.
    pub halt_on_numerical_failure: bool,
    /// Log a summary every this many episodes (0 disables).
    pub log_every: usize,
    /// Window of the moving-average return in episode summaries.
    pub average_window: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            schedule: UpdateSchedule::PerEpisode,
            replay: None,
            convergence: None,
            seed: 0,
            record_trajectories: false,
            halt_on_numerical_failure: false,
            log_every: 10,
            average_window: 10,
        }
    }
}

impl TrainerConfig {
    /// # Errors
    ///
    /// [`TrainError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.schedule == UpdateSchedule::EveryNSteps(0) {
            return Err(TrainError::config("schedule", "every_n_steps needs n >= 1"));
        }
        if let Some(replay) = &self.replay {
            if replay.capacity == 0 {
                return Err(TrainError::config("replay.capacity", "must be at least 1"));
            }
            if replay.batch_size == 0 {
                return Err(TrainError::config("replay.batch_size", "must be at least 1"));
            }
            if replay.warmup > replay.capacity {
                return Err(TrainError::config("replay.warmup", "cannot exceed the capacity"));
            }
        }
        if let Some(rule) = &self.convergence {
            if rule.window == 0 {
                return Err(TrainError::config("convergence.window", "must be at least 1"));
            }
            if !(rule.tolerance.is_finite() && rule.tolerance >= 0.0) {
                return Err(TrainError::config("convergence.tolerance", "must be finite and >= 0"));
            }
            if rule.patience == 0 {
                return Err(TrainError::config("convergence.patience", "must be at least 1"));
            }
        }
        if self.average_window == 0 {
            return Err(TrainError::config("average_window", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainError {
    #[error("invalid trainer configuration `{field}`: {reason}")]
    Config { field: String, reason: String },
}

impl TrainError {
    fn config(field: &str, reason: &str) -> Self {
        Self::Config {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<AgentError> for FailureKind {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Divergence { update } => FailureKind::Divergence { update },
            other => FailureKind::Agent {
                message: other.to_string(),
            },
        }
    }
}

/// Environment and agent seeds for one episode. The agent's exploration
/// stream is decorrelated from the environment's.
#[must_use]
pub fn episode_seeds(seed: u64, episode: usize) -> (u64, u64) {
    let env_seed = seed.wrapping_add(episode as u64);
    (env_seed, env_seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1B5_4A32_D192_ED03)
}

/// Where the next batch comes from.
enum Experience {
    /// Transitions since the last update.
    OnPolicy(Vec<Transition>),
    Replay {
        buffer: ReplayBuffer,
        config: ReplayConfig,
    },
}

struct EpisodeRun {
    summary: EpisodeSummary,
    records: Vec<StepRecord>,
}

pub struct Trainer<E, A> {
    env: E,
    agent: A,
    config: TrainerConfig,
    stop: StopToken,
    experience: Experience,
    sample_rng: fastrand::Rng,
    steps_since_update: usize,
}

impl<E, A> Trainer<E, A>
where
    E: Env,
    E::Info: Snapshot,
    A: Agent,
{
    /// # Errors
    ///
    /// [`TrainError::Config`] for an invalid configuration.
    pub fn new(env: E, agent: A, config: TrainerConfig) -> Result<Self, TrainError> {
        config.validate()?;
        let experience = match config.replay {
            Some(replay) => Experience::Replay {
                buffer: ReplayBuffer::new(replay.capacity),
                config: replay,
            },
            None => Experience::OnPolicy(Vec::new()),
        };
        Ok(Self {
            sample_rng: fastrand::Rng::with_seed(config.seed),
            env,
            agent,
            config,
            stop: StopToken::new(),
            experience,
            steps_since_update: 0,
        })
    }

    /// Replaces the internal stop token with a shared one.
    #[must_use]
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops the run at the next step boundary.
    #[must_use]
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub fn agent(&self) -> &A {
        &self.agent
    }

    #[must_use]
    pub fn into_parts(self) -> (E, A) {
        (self.env, self.agent)
    }

    /// Runs the configured number of training episodes.
    pub fn run(&mut self) -> TrainingReport {
        let mut report = TrainingReport::default();
        let mut average = MovingAverage::new(self.config.average_window);
        let mut convergence = self.config.convergence.map(ConvergenceTracker::new);
        info!(
            episodes = self.config.episodes,
            agent = self.agent.name(),
            seed = self.config.seed,
            "training started"
        );

        for episode in 0..self.config.episodes {
            if self.stop.is_stopped() {
                report.outcome = Outcome::Cancelled;
                break;
            }
            let run = match self.train_episode(episode, &mut report.updates) {
                Ok(run) => run,
                Err(failure) => {
                    error!(%failure, "training halted");
                    report.outcome = Outcome::Failed(failure);
                    break;
                }
            };
            let mut summary = run.summary;
            summary.moving_average = Some(average.push(summary.episode_return));
            report.total_steps += summary.length;
            report.steps.extend(run.records);
            if summary.abnormal {
                report.abnormal_episodes += 1;
                warn!(episode, step = summary.length, end = ?summary.end, "episode ended abnormally");
            }
            if self.config.log_every > 0 && (episode + 1) % self.config.log_every == 0 {
                info!(
                    episode,
                    episode_return = summary.episode_return,
                    length = summary.length,
                    moving_average = summary.moving_average,
                    updates = report.updates.len(),
                    "episode finished"
                );
            }
            let interrupted = summary.interrupted;
            let episode_return = summary.episode_return;
            report.episodes.push(summary);

            if interrupted {
                report.outcome = Outcome::Cancelled;
                break;
            }
            if convergence.as_mut().is_some_and(|c| c.observe(episode_return)) {
                info!(episode, "returns converged");
                report.outcome = Outcome::Converged { episode };
                break;
            }
        }

        info!(
            outcome = ?report.outcome,
            episodes = report.episodes.len(),
            updates = report.updates.len(),
            abnormal = report.abnormal_episodes,
            "training finished"
        );
        report
    }

    /// Runs `episodes` deterministic episodes without learning and restores
    /// the agent's previous mode afterwards.
    pub fn evaluate(&mut self, episodes: usize) -> Vec<EpisodeSummary> {
        let previous = self.agent.mode();
        self.agent.set_mode(Mode::Evaluation);
        let mut summaries = Vec::with_capacity(episodes);
        for i in 0..episodes {
            if self.stop.is_stopped() {
                break;
            }
            let episode = self.config.episodes + i;
            let (env_seed, agent_seed) = episode_seeds(self.config.seed, episode);
            let mut rng = fastrand::Rng::with_seed(agent_seed);
            let mut observation = self.env.reset(Some(env_seed));
            let mut summary = EpisodeSummary::start(episode);
            loop {
                if self.stop.is_stopped() {
                    summary.interrupted = true;
                    break;
                }
                let action = self.agent.act(&observation, &mut rng);
                let step = self.env.step(&action);
                summary.record(&step);
                if step.done() {
                    break;
                }
                observation = step.observation;
            }
            debug!(episode, episode_return = summary.episode_return, "evaluation episode");
            summaries.push(summary);
        }
        self.agent.set_mode(previous);
        summaries
    }

    fn train_episode(&mut self, episode: usize, updates: &mut Vec<UpdateMetrics>) -> Result<EpisodeRun, FatalFailure> {
        let (env_seed, agent_seed) = episode_seeds(self.config.seed, episode);
        let mut rng = fastrand::Rng::with_seed(agent_seed);
        let mut observation = self.env.reset(Some(env_seed));
        let mut summary = EpisodeSummary::start(episode);
        let mut records = Vec::new();

        loop {
            if self.stop.is_stopped() {
                summary.interrupted = true;
                return Ok(EpisodeRun { summary, records });
            }
            let action = self.agent.act(&observation, &mut rng);
            let step = self.env.step(&action);
            summary.record(&step);
            let at = summary.length;

            if self.config.record_trajectories {
                records.push(StepRecord {
                    episode,
                    step: at,
                    time: step.info.time(),
                    state: step.info.state().to_vec(),
                    action: action.clone(),
                    reward: step.reward,
                });
            }
            if self.config.halt_on_numerical_failure {
                if let Some(EpisodeEnd::Abnormal { reason }) = &step.end {
                    return Err(FatalFailure {
                        episode,
                        step: at,
                        kind: FailureKind::Numerical { reason: reason.clone() },
                    });
                }
            }

            let done = step.done();
            self.remember(Transition {
                observation,
                action,
                reward: step.reward,
                next_observation: step.observation.clone(),
                done,
                truncated: step.truncated(),
            });
            self.steps_since_update += 1;
            let due = match self.config.schedule {
                UpdateSchedule::PerStep => true,
                UpdateSchedule::EveryNSteps(n) => self.steps_since_update >= n,
                UpdateSchedule::PerEpisode => false,
            };
            if due {
                summary.updates += self.learn(updates).map_err(|kind| FatalFailure { episode, step: at, kind })?;
            }
            if done {
                break;
            }
            observation = step.observation;
        }

        if self.config.schedule == UpdateSchedule::PerEpisode {
            let at = summary.length;
            summary.updates += self.learn(updates).map_err(|kind| FatalFailure { episode, step: at, kind })?;
        }
        Ok(EpisodeRun { summary, records })
    }

    fn remember(&mut self, transition: Transition) {
        match &mut self.experience {
            Experience::OnPolicy(pending) => pending.push(transition),
            Experience::Replay { buffer, .. } => buffer.push(transition),
        }
    }

    /// Performs at most one agent update; returns how many ran.
    fn learn(&mut self, updates: &mut Vec<UpdateMetrics>) -> Result<usize, FailureKind> {
        self.steps_since_update = 0;
        let batch = match &mut self.experience {
            Experience::OnPolicy(pending) => std::mem::take(pending),
            Experience::Replay { buffer, config } => {
                if buffer.len() < config.warmup.max(1) {
                    return Ok(0);
                }
                buffer.sample(config.batch_size, &mut self.sample_rng)
            }
        };
        if batch.is_empty() {
            return Ok(0);
        }
        let metrics = self.agent.update(&batch)?;
        debug!(
            update = metrics.update,
            batch = batch.len(),
            policy_loss = metrics.policy_loss,
            value_loss = metrics.value_loss,
            "agent updated"
        );
        updates.push(metrics);
        Ok(1)
    }
}

impl EpisodeSummary {
    pub(crate) fn start(episode: usize) -> Self {
        Self {
            episode,
            episode_return: 0.0,
            length: 0,
            end: None,
            abnormal: false,
            interrupted: false,
            updates: 0,
            moving_average: None,
        }
    }

    pub(crate) fn record<I>(&mut self, step: &Step<I>) {
        self.length += 1;
        self.episode_return += step.reward;
        if step.done() {
            self.abnormal = step.abnormal();
            self.end.clone_from(&step.end);
        }
    }
}

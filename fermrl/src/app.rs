//! # Session
//!
//! Builds the environment and agent from a [`RunConfig`], trains, and
//! optionally evaluates the result.

use anyhow::{bail, Result};
use bioreactor::FermentationEnv;
use ml::{ActorCritic, Agent, Env, FixedAgent};
use rl::{EpisodeSummary, StopToken, Trainer, TrainingReport};
use serde::Serialize;
use tracing::info;

use crate::RunConfig;

/// Which controller to train.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Controller {
    #[default]
    ActorCritic,
    /// Holds every action at the midpoint of its bounds.
    Baseline,
}

#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub agent: String,
    pub report: TrainingReport,
    /// Deterministic episodes played after training.
    pub evaluation: Vec<EpisodeSummary>,
}

impl Session {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_evaluation_return(&self) -> Option<f64> {
        if self.evaluation.is_empty() {
            return None;
        }
        Some(self.evaluation.iter().map(|e| e.episode_return).sum::<f64>() / self.evaluation.len() as f64)
    }
}

/// Trains the chosen controller and plays `evaluate` evaluation episodes.
///
/// A run that ends in a fatal failure still returns its session; the
/// failure is in `report.outcome`.
///
/// # Errors
///
/// Any invalid section of `config`.
pub fn run(config: &RunConfig, controller: Controller, evaluate: usize, stop: &StopToken) -> Result<Session> {
    let env = FermentationEnv::new(config.env.clone())?;
    match controller {
        Controller::ActorCritic => {
            let agent = ActorCritic::new(env.observation_size(), env.action_bounds(), config.agent.clone())?;
            session(env, agent, config, evaluate, stop)
        }
        Controller::Baseline => {
            let agent = FixedAgent::midpoint(env.action_bounds());
            session(env, agent, config, evaluate, stop)
        }
    }
}

fn session<A: Agent>(
    env: FermentationEnv,
    agent: A,
    config: &RunConfig,
    evaluate: usize,
    stop: &StopToken,
) -> Result<Session> {
    info!(
        species = config.env.kinetics.species.len(),
        substrates = config.env.kinetics.substrates.len(),
        horizon = config.env.horizon,
        decision_interval = config.env.decision_interval,
        "environment ready"
    );
    let mut trainer = Trainer::new(env, agent, config.trainer.clone())?.with_stop_token(stop.clone());
    let report = trainer.run();
    let evaluation = if evaluate > 0 && report.failure().is_none() {
        trainer.evaluate(evaluate)
    } else {
        Vec::new()
    };
    Ok(Session {
        agent: trainer.agent().name().to_string(),
        report,
        evaluation,
    })
}

/// Logs the session outcome; fails when training failed.
///
/// # Errors
///
/// The run's [`rl::FatalFailure`], if any.
pub fn finish(session: &Session) -> Result<()> {
    let report = &session.report;
    info!(
        agent = %session.agent,
        outcome = ?report.outcome,
        episodes = report.episodes.len(),
        updates = report.updates.len(),
        abnormal = report.abnormal_episodes,
        best_return = report.best_return(),
        evaluation_return = session.mean_evaluation_return(),
        "session finished"
    );
    if let Some(failure) = report.failure() {
        bail!("training failed: {failure}");
    }
    Ok(())
}

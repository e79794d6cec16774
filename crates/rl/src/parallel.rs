//! Parallel episode collection.
//!
//! Each worker builds its own environment, so workers share nothing but the
//! agent. The agent sits behind a [`SharedAgent`] read lock while acting;
//! updates take the write lock between collection rounds. Results come back
//! in seed order regardless of scheduling, and every episode is a pure
//! function of its seed and the agent parameters.

use ml::{Agent, AgentError, Env, SharedAgent, Transition, UpdateMetrics};
use rayon::prelude::*;
use tracing::info;

use crate::metrics::EpisodeSummary;
use crate::trainer::episode_seeds;

/// One collected episode.
#[derive(Clone, Debug)]
pub struct EpisodeRollout {
    pub seed: u64,
    pub summary: EpisodeSummary,
    pub transitions: Vec<Transition>,
}

/// Plays one episode per seed on the rayon pool.
///
/// `max_steps` caps episodes of environments that never end on their own.
pub fn collect_episodes<E, A, F>(
    make_env: F,
    agent: &SharedAgent<A>,
    seeds: &[u64],
    max_steps: usize,
) -> Vec<EpisodeRollout>
where
    E: Env,
    A: Agent + Send + Sync,
    F: Fn() -> E + Sync,
{
    seeds
        .par_iter()
        .enumerate()
        .map(|(index, &seed)| {
            let mut env = make_env();
            rollout(&mut env, agent, index, seed, max_steps)
        })
        .collect()
}

fn rollout<E: Env, A: Agent>(
    env: &mut E,
    agent: &SharedAgent<A>,
    index: usize,
    seed: u64,
    max_steps: usize,
) -> EpisodeRollout {
    let (env_seed, agent_seed) = episode_seeds(seed, 0);
    let mut rng = fastrand::Rng::with_seed(agent_seed);
    let mut observation = env.reset(Some(env_seed));
    let mut summary = EpisodeSummary::start(index);
    let mut transitions = Vec::new();
    while summary.length < max_steps {
        let action = agent.act(&observation, &mut rng);
        let step = env.step(&action);
        summary.record(&step);
        let done = step.done();
        transitions.push(Transition {
            observation,
            action,
            reward: step.reward,
            next_observation: step.observation.clone(),
            done,
            truncated: step.truncated(),
        });
        if done {
            break;
        }
        observation = step.observation;
    }
    EpisodeRollout {
        seed,
        summary,
        transitions,
    }
}

/// Alternates parallel collection and one update on the pooled
/// transitions, `rounds` times. Round `r` uses seeds
/// `seed + r * workers .. seed + (r + 1) * workers`.
///
/// # Errors
///
/// The first [`AgentError`] returned by an update; earlier updates stay
/// committed.
pub fn train_in_rounds<E, A, F>(
    make_env: F,
    agent: &SharedAgent<A>,
    rounds: usize,
    workers: usize,
    seed: u64,
    max_steps: usize,
) -> Result<Vec<(Vec<EpisodeSummary>, UpdateMetrics)>, AgentError>
where
    E: Env,
    A: Agent + Send + Sync,
    F: Fn() -> E + Sync,
{
    let mut history = Vec::with_capacity(rounds);
    for round in 0..rounds {
        let base = seed.wrapping_add((round * workers) as u64);
        let seeds: Vec<u64> = (0..workers as u64).map(|w| base.wrapping_add(w)).collect();
        let rollouts = collect_episodes(&make_env, agent, &seeds, max_steps);
        let batch: Vec<Transition> = rollouts.iter().flat_map(|r| r.transitions.iter().cloned()).collect();
        let metrics = agent.update(&batch)?;
        #[allow(clippy::cast_precision_loss)]
        let mean_return = rollouts.iter().map(|r| r.summary.episode_return).sum::<f64>() / workers.max(1) as f64;
        info!(round, mean_return, update = metrics.update, "parallel round finished");
        history.push((rollouts.into_iter().map(|r| r.summary).collect(), metrics));
    }
    Ok(history)
}

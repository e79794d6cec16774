//! # Gaussian Actor-Critic
//!
//! The policy network outputs a pre-activation `z`; the action mean in
//! normalized units is `μ = tanh(z)` and the policy samples
//! `u ~ N(μ, σ²)` with a learned per-dimension `log σ`. Normalized actions
//! are mapped onto the environment's bounds, so `u = ±1` is the edge of the
//! admissible range. Samples may fall outside and are clipped by the
//! environment.
//!
//! Updates use one-step TD advantages from a separate value network:
//!
//! ```text
//! target = r + γ · (1 − terminal) · V(s')
//! A      = target − V(s)
//! L_π    = −mean(A · log π(u|s)) − c_H · H(π)
//! L_V    = ½ · mean((V(s) − target)²)
//! ```
//!
//! The value network's output layer starts at zero, so a batch with zero
//! rewards carries zero advantage and zero value error, and an update leaves
//! every parameter where it was.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::{Agent, AgentError, Mode, UpdateMetrics};
use crate::env::Bounds;
use crate::nn::Mlp;
use crate::optim::{clip_global_norm, Adam};
use crate::rng;
use crate::transition::Transition;

const LN_TAU: f64 = 1.837_877_066_409_345_3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorCriticConfig {
    /// Hidden units in both networks.
    pub hidden: usize,
    /// Policy learning rate (also used for `log σ`).
    pub learning_rate: f64,
    pub critic_learning_rate: f64,
    /// Discount factor γ.
    pub gamma: f64,
    /// Initial exploration standard deviation in normalized action units.
    pub exploration_scale: f64,
    pub min_log_std: f64,
    pub max_log_std: f64,
    /// Entropy bonus coefficient c_H.
    pub entropy_coef: f64,
    pub max_grad_norm: f64,
    /// Gradient steps per batch.
    pub epochs: usize,
    pub normalize_advantages: bool,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ActorCriticConfig {
    fn default() -> Self {
        Self {
            hidden: 32,
            learning_rate: 1e-3,
            critic_learning_rate: 3e-3,
            gamma: 0.99,
            exploration_scale: 0.3,
            min_log_std: -5.0,
            max_log_std: 0.5,
            entropy_coef: 0.0,
            max_grad_norm: 1.0,
            epochs: 1,
            normalize_advantages: true,
            seed: 0,
        }
    }
}

impl ActorCriticConfig {
    /// # Errors
    ///
    /// [`AgentError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), AgentError> {
        let positive = |field: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AgentError::config(field, format!("must be finite and positive, got {value}")))
            }
        };
        if self.hidden == 0 {
            return Err(AgentError::config("hidden", "must be at least 1"));
        }
        positive("learning_rate", self.learning_rate)?;
        positive("critic_learning_rate", self.critic_learning_rate)?;
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(AgentError::config("gamma", format!("must lie in [0, 1], got {}", self.gamma)));
        }
        positive("exploration_scale", self.exploration_scale)?;
        if !(self.min_log_std.is_finite() && self.max_log_std.is_finite()) || self.min_log_std > self.max_log_std {
            return Err(AgentError::config("min_log_std", "must be finite and not above max_log_std"));
        }
        if !(self.entropy_coef.is_finite() && self.entropy_coef >= 0.0) {
            return Err(AgentError::config("entropy_coef", "must be finite and non-negative"));
        }
        positive("max_grad_norm", self.max_grad_norm)?;
        if self.epochs == 0 {
            return Err(AgentError::config("epochs", "must be at least 1"));
        }
        Ok(())
    }
}

/// Trainable parameters plus the optimizer state that moves them. Cloned
/// before an update and swapped in only when the result is finite.
#[derive(Clone, Debug)]
struct Parameters {
    policy: Mlp,
    log_std: Vec<f64>,
    value: Mlp,
    policy_opt: Adam,
    value_opt: Adam,
}

impl Parameters {
    fn is_finite(&self) -> bool {
        self.policy.is_finite() && self.value.is_finite() && self.log_std.iter().all(|v| v.is_finite())
    }
}

#[derive(Clone, Debug)]
pub struct ActorCritic {
    config: ActorCriticConfig,
    bounds: Vec<Bounds>,
    observation_size: usize,
    params: Parameters,
    mode: Mode,
    updates: u64,
}

impl ActorCritic {
    /// # Errors
    ///
    /// [`AgentError::Config`] for an invalid configuration, an empty
    /// observation or action space, or an invalid action bound.
    pub fn new(
        observation_size: usize,
        action_bounds: &[Bounds],
        config: ActorCriticConfig,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        if observation_size == 0 {
            return Err(AgentError::config("observation_size", "must be at least 1"));
        }
        if action_bounds.is_empty() {
            return Err(AgentError::config("action_bounds", "must not be empty"));
        }
        if let Some(i) = action_bounds.iter().position(|b| !b.is_valid()) {
            return Err(AgentError::config(
                &format!("action_bounds[{i}]"),
                "must be finite with low <= high",
            ));
        }

        let action_size = action_bounds.len();
        let mut rng = fastrand::Rng::with_seed(config.seed);
        let policy = Mlp::new(observation_size, config.hidden, action_size, 0.01, &mut rng);
        let value = Mlp::new(observation_size, config.hidden, 1, 0.0, &mut rng);
        let log_std = vec![config.exploration_scale.ln().clamp(config.min_log_std, config.max_log_std); action_size];

        let mut policy_sizes = policy.param_sizes().to_vec();
        policy_sizes.push(action_size);
        let params = Parameters {
            policy_opt: Adam::new(&policy_sizes, config.learning_rate),
            value_opt: Adam::new(&value.param_sizes(), config.critic_learning_rate),
            policy,
            log_std,
            value,
        };

        Ok(Self {
            config,
            bounds: action_bounds.to_vec(),
            observation_size,
            params,
            mode: Mode::Training,
            updates: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ActorCriticConfig {
        &self.config
    }

    /// Number of committed updates.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Deterministic action in physical units.
    #[must_use]
    pub fn mean_action(&self, observation: &[f64]) -> Vec<f64> {
        let obs = self.fit_observation(observation);
        self.mean(&obs)
            .iter()
            .zip(&self.bounds)
            .map(|(&mu, b)| b.denormalize(mu))
            .collect()
    }

    /// Critic estimate `V(s)`.
    #[must_use]
    pub fn value(&self, observation: &[f64]) -> f64 {
        let obs = self.fit_observation(observation);
        self.params.value.forward(&obs)[0]
    }

    #[must_use]
    pub fn log_std(&self) -> &[f64] {
        &self.params.log_std
    }

    /// Every trainable parameter, flattened in a fixed order.
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        let p = &self.params;
        [&p.policy.hidden.w, &p.policy.hidden.b, &p.policy.out.w, &p.policy.out.b, &p.log_std]
            .into_iter()
            .chain([&p.value.hidden.w, &p.value.hidden.b, &p.value.out.w, &p.value.out.b])
            .flat_map(|buffer| buffer.iter().copied())
            .collect()
    }

    fn mean(&self, observation: &[f64]) -> Vec<f64> {
        self.params.policy.forward(observation).into_iter().map(f64::tanh).collect()
    }

    fn fit_observation(&self, observation: &[f64]) -> Vec<f64> {
        if observation.len() != self.observation_size {
            warn!(
                expected = self.observation_size,
                actual = observation.len(),
                "observation size mismatch, padding with zeros"
            );
        }
        let mut obs = observation.to_vec();
        obs.resize(self.observation_size, 0.0);
        obs
    }

    fn check_batch(&self, batch: &[Transition]) -> Result<(), AgentError> {
        for t in batch {
            for obs in [&t.observation, &t.next_observation] {
                if obs.len() != self.observation_size {
                    return Err(AgentError::ObservationSize {
                        expected: self.observation_size,
                        actual: obs.len(),
                    });
                }
            }
            if t.action.len() != self.bounds.len() {
                return Err(AgentError::ActionSize {
                    expected: self.bounds.len(),
                    actual: t.action.len(),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
    fn train(&self, params: &mut Parameters, batch: &[Transition]) -> UpdateMetrics {
        let n = batch.len() as f64;
        let cfg = &self.config;

        let targets: Vec<f64> = batch
            .iter()
            .map(|t| {
                let bootstrap = if t.terminal() {
                    0.0
                } else {
                    params.value.forward(&t.next_observation)[0]
                };
                cfg.gamma.mul_add(bootstrap, t.reward)
            })
            .collect();
        let mut advantages: Vec<f64> = batch
            .iter()
            .zip(&targets)
            .map(|(t, target)| target - params.value.forward(&t.observation)[0])
            .collect();
        let mean_advantage = advantages.iter().sum::<f64>() / n;
        if cfg.normalize_advantages && batch.len() > 1 {
            let std = (advantages.iter().map(|a| (a - mean_advantage).powi(2)).sum::<f64>() / n).sqrt();
            for a in &mut advantages {
                *a = (*a - mean_advantage) / (std + 1e-8);
            }
        }
        let normalized_actions: Vec<Vec<f64>> = batch
            .iter()
            .map(|t| t.action.iter().zip(&self.bounds).map(|(&a, b)| b.normalize(a)).collect())
            .collect();

        let mut metrics = UpdateMetrics {
            mean_advantage,
            batch_size: batch.len(),
            ..UpdateMetrics::default()
        };

        for _ in 0..cfg.epochs {
            let mut policy_grad = params.policy.zero_grad();
            let mut value_grad = params.value.zero_grad();
            let mut log_std_grad = vec![0.0; params.log_std.len()];
            let sigma: Vec<f64> = params.log_std.iter().map(|l| l.exp()).collect();
            let mut policy_loss = 0.0;
            let mut value_loss = 0.0;

            for (k, t) in batch.iter().enumerate() {
                let adv = advantages[k];
                let u = &normalized_actions[k];
                let (z, h) = params.policy.forward_cached(&t.observation);
                let mut grad_z = vec![0.0; z.len()];
                let mut log_prob = 0.0;
                let dims = z.iter().zip(u).zip(&sigma).zip(&params.log_std);
                for ((((&zd, &ud), &sd), &ld), (gz, gl)) in dims.zip(grad_z.iter_mut().zip(&mut log_std_grad)) {
                    let mu = zd.tanh();
                    let diff = ud - mu;
                    let scaled = diff / sd;
                    log_prob += (-0.5f64).mul_add(scaled * scaled, -ld) - 0.5 * LN_TAU;
                    let grad_mu = -adv / n * diff / (sd * sd);
                    *gz = grad_mu * (1.0 - mu * mu);
                    *gl += -adv / n * scaled.mul_add(scaled, -1.0);
                }
                policy_loss -= adv * log_prob / n;
                params.policy.backward(&t.observation, &h, &grad_z, &mut policy_grad);

                let (v, hv) = params.value.forward_cached(&t.observation);
                let err = v[0] - targets[k];
                value_loss += 0.5 * err * err / n;
                params.value.backward(&t.observation, &hv, &[err / n], &mut value_grad);
            }

            let entropy: f64 = params.log_std.iter().map(|l| l + 0.5 * (1.0 + LN_TAU)).sum();
            for g in &mut log_std_grad {
                *g -= cfg.entropy_coef;
            }

            let [pw, pb, ow, ob] = policy_grad.buffers_mut();
            let [vw, vb, uw, ub] = value_grad.buffers_mut();
            let grad_norm = clip_global_norm(&mut [pw, pb, ow, ob, &mut log_std_grad, vw, vb, uw, ub], cfg.max_grad_norm);

            {
                let [hw, hb, pw, pb] = params.policy.params_mut();
                let [g0, g1, g2, g3] = policy_grad.buffers();
                params
                    .policy_opt
                    .step(&mut [hw, hb, pw, pb, &mut params.log_std], &[g0, g1, g2, g3, log_std_grad.as_slice()]);
            }
            params.value_opt.step(&mut params.value.params_mut(), &value_grad.buffers());
            for l in &mut params.log_std {
                *l = l.clamp(cfg.min_log_std, cfg.max_log_std);
            }

            metrics.policy_loss = cfg.entropy_coef.mul_add(-entropy, policy_loss);
            metrics.value_loss = value_loss;
            metrics.entropy = entropy;
            metrics.grad_norm = grad_norm;
        }
        metrics
    }
}

impl Agent for ActorCritic {
    fn act(&self, observation: &[f64], rng: &mut fastrand::Rng) -> Vec<f64> {
        let obs = self.fit_observation(observation);
        let mean = self.mean(&obs);
        mean.iter()
            .zip(&self.bounds)
            .zip(&self.params.log_std)
            .map(|((&mu, b), &log_std)| {
                let u = match self.mode {
                    Mode::Training => log_std.exp().mul_add(rng::normal(rng), mu),
                    Mode::Evaluation => mu,
                };
                b.denormalize(u)
            })
            .collect()
    }

    fn update(&mut self, batch: &[Transition]) -> Result<UpdateMetrics, AgentError> {
        if self.mode == Mode::Evaluation {
            return Err(AgentError::UpdateInEvaluation);
        }
        if batch.is_empty() {
            return Err(AgentError::EmptyBatch);
        }
        self.check_batch(batch)?;

        let update = self.updates + 1;
        let mut next = self.params.clone();
        let mut metrics = self.train(&mut next, batch);
        if !next.is_finite() {
            warn!(update, "update produced non-finite parameters, discarding");
            return Err(AgentError::Divergence { update });
        }
        self.params = next;
        self.updates = update;
        metrics.update = update;
        debug!(
            update,
            policy_loss = metrics.policy_loss,
            value_loss = metrics.value_loss,
            grad_norm = metrics.grad_norm,
            "actor-critic update"
        );
        Ok(metrics)
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn name(&self) -> &str {
        "actor_critic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<Bounds> {
        vec![Bounds::new(0.0, 0.05), Bounds::new(15.0, 35.0)]
    }

    #[test]
    fn evaluation_actions_are_deterministic_and_inside_bounds() {
        let mut agent = ActorCritic::new(3, &bounds(), ActorCriticConfig::default()).unwrap();
        agent.set_mode(Mode::Evaluation);
        let mut a = fastrand::Rng::with_seed(1);
        let mut b = fastrand::Rng::with_seed(99);
        let obs = [0.2, -0.4, 1.0];
        let x = agent.act(&obs, &mut a);
        assert_eq!(x, agent.act(&obs, &mut b));
        assert_eq!(x, agent.mean_action(&obs));
        for (v, bound) in x.iter().zip(bounds()) {
            assert!(bound.contains(*v));
        }
    }

    #[test]
    fn training_actions_explore() {
        let agent = ActorCritic::new(3, &bounds(), ActorCriticConfig::default()).unwrap();
        let mut rng = fastrand::Rng::with_seed(4);
        let first = agent.act(&[0.0; 3], &mut rng);
        let second = agent.act(&[0.0; 3], &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn same_seed_same_weights() {
        let a = ActorCritic::new(3, &bounds(), ActorCriticConfig::default()).unwrap();
        let b = ActorCritic::new(3, &bounds(), ActorCriticConfig::default()).unwrap();
        assert_eq!(a.parameters(), b.parameters());
        let c = ActorCritic::new(3, &bounds(), ActorCriticConfig { seed: 1, ..ActorCriticConfig::default() }).unwrap();
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn value_starts_at_zero() {
        let agent = ActorCritic::new(3, &bounds(), ActorCriticConfig::default()).unwrap();
        assert_eq!(agent.value(&[5.0, -2.0, 0.1]), 0.0);
    }

    #[test]
    fn config_errors_name_the_field() {
        let cases = [
            (ActorCriticConfig { hidden: 0, ..ActorCriticConfig::default() }, "hidden"),
            (ActorCriticConfig { gamma: 1.5, ..ActorCriticConfig::default() }, "gamma"),
            (ActorCriticConfig { epochs: 0, ..ActorCriticConfig::default() }, "epochs"),
            (ActorCriticConfig { learning_rate: f64::NAN, ..ActorCriticConfig::default() }, "learning_rate"),
        ];
        for (config, expected) in cases {
            match ActorCritic::new(3, &bounds(), config) {
                Err(AgentError::Config { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected config error for {expected}, got {other:?}"),
            }
        }
        assert!(matches!(
            ActorCritic::new(3, &[Bounds::new(1.0, 0.0)], ActorCriticConfig::default()),
            Err(AgentError::Config { .. })
        ));
    }
}

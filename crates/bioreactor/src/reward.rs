//! # Reward Shaping
//!
//! The per-step reward is a weighted sum of independent terms. Weights are
//! configuration; the terms themselves are fixed:
//!
//! | Term | Sign | Quantity |
//! |------|------|----------|
//! | `productivity` | + | product mass formed per hour, `Δ(P·V)/Δt` (g/h) |
//! | `substrate_cost` | − | substrate mass fed during the step (g) |
//! | `control_effort` | − | `Σ u_k²`, `u` the applied action normalized to `[-1, 1]` |
//! | `clip_penalty` | − | total normalized amount the proposal was clipped by |
//! | `infeasible_penalty` | − | flat, when the state leaves the operating region |
//! | `failure_penalty` | − | flat, when integration fails |
//!
//! [`RewardFunction::evaluate`] is stateless: the same inputs always give the
//! same breakdown.

use kinetics::error::require_non_negative;
use kinetics::{ConfigError, StateLayout};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub productivity: f64,
    pub substrate_cost: f64,
    pub control_effort: f64,
    pub clip_penalty: f64,
    pub infeasible_penalty: f64,
    pub failure_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            productivity: 1.0,
            substrate_cost: 0.005,
            control_effort: 0.01,
            clip_penalty: 0.1,
            infeasible_penalty: 0.5,
            failure_penalty: 10.0,
        }
    }
}

impl RewardWeights {
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a negative or non-finite weight.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("productivity", self.productivity)?;
        require_non_negative("substrate_cost", self.substrate_cost)?;
        require_non_negative("control_effort", self.control_effort)?;
        require_non_negative("clip_penalty", self.clip_penalty)?;
        require_non_negative("infeasible_penalty", self.infeasible_penalty)?;
        require_non_negative("failure_penalty", self.failure_penalty)
    }
}

/// Everything the reward depends on for one decision step.
#[derive(Clone, Debug)]
pub struct RewardInputs<'a> {
    pub layout: StateLayout,
    pub before: &'a [f64],
    pub after: &'a [f64],
    /// Simulated hours between `before` and `after`.
    pub duration: f64,
    /// Applied action normalized to `[-1, 1]` per dimension.
    pub normalized_action: &'a [f64],
    /// Sum of normalized clipping distances.
    pub clip_amount: f64,
    /// Substrate mass fed during the step (g).
    pub substrate_fed: f64,
    pub infeasible: bool,
    pub failed: bool,
}

/// Signed contribution of every term; `total` is their sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub productivity: f64,
    pub substrate_cost: f64,
    pub control_effort: f64,
    pub clip_penalty: f64,
    pub infeasible_penalty: f64,
    pub failure_penalty: f64,
    pub total: f64,
}

#[derive(Clone, Debug, Default)]
pub struct RewardFunction {
    weights: RewardWeights,
}

impl RewardFunction {
    #[must_use]
    pub fn new(weights: RewardWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn evaluate(&self, inputs: &RewardInputs<'_>) -> RewardBreakdown {
        let w = &self.weights;
        let formed = inputs.layout.product_mass(inputs.after) - inputs.layout.product_mass(inputs.before);
        let productivity = if inputs.duration > 0.0 {
            w.productivity * formed / inputs.duration
        } else {
            0.0
        };
        let effort: f64 = inputs.normalized_action.iter().map(|u| u * u).sum();
        let flag = |on: bool, weight: f64| if on { -weight } else { 0.0 };

        let mut breakdown = RewardBreakdown {
            productivity,
            substrate_cost: -w.substrate_cost * inputs.substrate_fed,
            control_effort: -w.control_effort * effort,
            clip_penalty: -w.clip_penalty * inputs.clip_amount,
            infeasible_penalty: flag(inputs.infeasible, w.infeasible_penalty),
            failure_penalty: flag(inputs.failed, w.failure_penalty),
            total: 0.0,
        };
        breakdown.total = breakdown.productivity
            + breakdown.substrate_cost
            + breakdown.control_effort
            + breakdown.clip_penalty
            + breakdown.infeasible_penalty
            + breakdown.failure_penalty;
        breakdown
    }
}

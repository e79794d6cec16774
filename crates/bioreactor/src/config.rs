//! Environment configuration.
//!
//! Every section deserializes from JSON with defaults for missing fields, so
//! a configuration file only needs to name what it changes. Validation runs
//! once, when the environment is built, and reports the first offending
//! field by its dotted path.

use kinetics::error::{require_non_negative, require_positive};
use kinetics::{ConfigError, IntegratorConfig, KineticParams, StateLayout};
use ml::Bounds;
use serde::{Deserialize, Serialize};

use crate::reward::RewardWeights;

/// Initial-state ranges. With `randomize` off every episode starts at the
/// midpoint of each range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConditions {
    /// One range per species (g/L).
    pub biomass: Vec<Bounds>,
    /// One range per substrate pool (g/L).
    pub substrates: Vec<Bounds>,
    pub product: Bounds,
    /// Broth volume (L).
    pub volume: Bounds,
    pub randomize: bool,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            biomass: vec![Bounds::new(0.1, 0.3), Bounds::new(0.01, 0.05)],
            substrates: vec![Bounds::new(80.0, 120.0), Bounds::new(2.0, 4.0)],
            product: Bounds::fixed(0.0),
            volume: Bounds::fixed(1.0),
            randomize: true,
        }
    }
}

impl InitialConditions {
    /// Ranges in state-vector order.
    #[must_use]
    pub fn ranges(&self) -> Vec<Bounds> {
        let mut ranges = self.biomass.clone();
        ranges.extend(self.substrates.iter().copied());
        ranges.push(self.product);
        ranges.push(self.volume);
        ranges
    }

    fn validate(&self, layout: StateLayout) -> Result<(), ConfigError> {
        if self.biomass.len() != layout.species {
            return Err(ConfigError::new(
                "biomass",
                format!("{} ranges for {} species", self.biomass.len(), layout.species),
            ));
        }
        if self.substrates.len() != layout.substrates {
            return Err(ConfigError::new(
                "substrates",
                format!("{} ranges for {} substrates", self.substrates.len(), layout.substrates),
            ));
        }
        let named = self
            .biomass
            .iter()
            .enumerate()
            .map(|(i, b)| (format!("biomass[{i}]"), b))
            .chain(self.substrates.iter().enumerate().map(|(j, b)| (format!("substrates[{j}]"), b)))
            .chain([("product".to_string(), &self.product), ("volume".to_string(), &self.volume)]);
        for (field, bounds) in named {
            check_bounds(&field, bounds)?;
            require_non_negative(&format!("{field}.low"), bounds.low)?;
        }
        require_positive("volume.low", self.volume.low)
    }
}

/// Admissible range of each control input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionBounds {
    /// Feed flow (L/h).
    pub feed_rate: Bounds,
    /// Temperature (°C).
    pub temperature: Bounds,
    pub ph: Bounds,
}

impl Default for ActionBounds {
    fn default() -> Self {
        Self {
            feed_rate: Bounds::new(0.0, 0.05),
            temperature: Bounds::new(15.0, 35.0),
            ph: Bounds::new(3.0, 6.0),
        }
    }
}

impl ActionBounds {
    /// Bounds in action-vector order: feed rate, temperature, pH.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Bounds> {
        vec![self.feed_rate, self.temperature, self.ph]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_bounds("feed_rate", &self.feed_rate)?;
        check_bounds("temperature", &self.temperature)?;
        check_bounds("ph", &self.ph)?;
        require_non_negative("feed_rate.low", self.feed_rate.low)
    }
}

/// Operating region. Leaving it ends the episode as a terminal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feasibility {
    /// Total biomass (g/L) below which the culture counts as collapsed.
    pub min_total_biomass: f64,
    /// Total substrate (g/L) below which the medium counts as depleted.
    pub min_total_substrate: f64,
    /// Working volume of the vessel (L).
    pub max_volume: f64,
}

impl Default for Feasibility {
    fn default() -> Self {
        Self {
            min_total_biomass: 1e-4,
            min_total_substrate: 1e-3,
            max_volume: 2.0,
        }
    }
}

impl Feasibility {
    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("min_total_biomass", self.min_total_biomass)?;
        require_non_negative("min_total_substrate", self.min_total_substrate)?;
        require_positive("max_volume", self.max_volume)
    }
}

/// What the agent sees of the process state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// State indices to expose, in order. `None` exposes the full state.
    pub components: Option<Vec<usize>>,
    /// Divisor for each exposed component. `None` derives one from the
    /// initial-state ranges.
    pub scale: Option<Vec<f64>>,
    /// Standard deviation of multiplicative gaussian noise.
    pub noise_std: f64,
    /// Append elapsed time as a fraction of the episode length.
    pub include_time: bool,
}

impl ObservationConfig {
    fn validate(&self, dim: usize) -> Result<(), ConfigError> {
        let exposed = match &self.components {
            Some(components) => {
                if components.is_empty() && !self.include_time {
                    return Err(ConfigError::new("components", "observation would be empty"));
                }
                if let Some((k, &index)) = components.iter().enumerate().find(|(_, &i)| i >= dim) {
                    return Err(ConfigError::new(
                        format!("components[{k}]"),
                        format!("index {index} outside a state of {dim} components"),
                    ));
                }
                components.len()
            }
            None => dim,
        };
        if let Some(scale) = &self.scale {
            if scale.len() != exposed {
                return Err(ConfigError::new(
                    "scale",
                    format!("{} entries for {exposed} observed components", scale.len()),
                ));
            }
            for (k, &s) in scale.iter().enumerate() {
                require_positive(&format!("scale[{k}]"), s)?;
            }
        }
        require_non_negative("noise_std", self.noise_std)
    }
}

/// Complete description of one fermentation environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub kinetics: KineticParams,
    pub initial: InitialConditions,
    pub actions: ActionBounds,
    pub integrator: IntegratorConfig,
    /// Simulated hours between two decisions.
    pub decision_interval: f64,
    /// Decisions per episode.
    pub horizon: usize,
    pub feasibility: Feasibility,
    pub observation: ObservationConfig,
    pub reward: RewardWeights,
    /// Seed used until `reset` is given one.
    pub seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            kinetics: KineticParams::wine_like(),
            initial: InitialConditions::default(),
            actions: ActionBounds::default(),
            integrator: IntegratorConfig::default(),
            decision_interval: 2.0,
            horizon: 48,
            feasibility: Feasibility::default(),
            observation: ObservationConfig::default(),
            reward: RewardWeights::default(),
            seed: 0,
        }
    }
}

impl EnvConfig {
    #[must_use]
    pub fn layout(&self) -> StateLayout {
        StateLayout::new(self.kinetics.species.len(), self.kinetics.substrates.len())
    }

    /// Simulated length of a full episode (h).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        self.decision_interval * self.horizon as f64
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid field, e.g.
    /// `initial.volume.low` or `kinetics.species[0].ks`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.kinetics.validate().map_err(|e| e.within("kinetics"))?;
        let layout = self.layout();
        self.initial.validate(layout).map_err(|e| e.within("initial"))?;
        self.actions.validate().map_err(|e| e.within("actions"))?;
        self.integrator.validate().map_err(|e| e.within("integrator"))?;
        require_positive("decision_interval", self.decision_interval)?;
        if self.decision_interval < self.integrator.dt {
            return Err(ConfigError::new(
                "decision_interval",
                format!(
                    "{} is shorter than the integrator step {}",
                    self.decision_interval, self.integrator.dt
                ),
            ));
        }
        if self.horizon == 0 {
            return Err(ConfigError::new("horizon", "must be at least one decision"));
        }
        self.feasibility.validate().map_err(|e| e.within("feasibility"))?;
        if self.initial.volume.high > self.feasibility.max_volume {
            return Err(ConfigError::new(
                "feasibility.max_volume",
                "initial volume range exceeds the vessel",
            ));
        }
        self.observation
            .validate(layout.dim())
            .map_err(|e| e.within("observation"))?;
        self.reward.validate().map_err(|e| e.within("reward"))
    }
}

fn check_bounds(field: &str, bounds: &Bounds) -> Result<(), ConfigError> {
    if bounds.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::new(
            field,
            format!("[{}, {}] is not a finite interval with low <= high", bounds.low, bounds.high),
        ))
    }
}

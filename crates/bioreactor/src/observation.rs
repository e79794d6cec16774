use kinetics::StateLayout;
use ml::rng;

use crate::config::{EnvConfig, ObservationConfig};

/// Maps process states to the observation vectors agents see: selects
/// components, divides by a per-component scale, applies multiplicative
/// noise and optionally appends normalized elapsed time.
#[derive(Clone, Debug)]
pub struct Observer {
    components: Vec<usize>,
    scale: Vec<f64>,
    noise_std: f64,
    include_time: bool,
    duration: f64,
}

impl Observer {
    /// Builds the observer for a validated configuration.
    #[must_use]
    pub fn new(config: &EnvConfig) -> Self {
        let ObservationConfig {
            components,
            scale,
            noise_std,
            include_time,
        } = &config.observation;
        let components = components
            .clone()
            .unwrap_or_else(|| (0..config.layout().dim()).collect());
        let scale = scale
            .clone()
            .unwrap_or_else(|| derived_scale(config, &components));
        Self {
            components,
            scale,
            noise_std: *noise_std,
            include_time: *include_time,
            duration: config.duration(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.components.len() + usize::from(self.include_time)
    }

    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Observation of `state` at `elapsed` hours. Draws from `rng` only when
    /// noise is enabled.
    pub fn observe(&self, state: &[f64], elapsed: f64, rng: &mut fastrand::Rng) -> Vec<f64> {
        let mut obs: Vec<f64> = self
            .components
            .iter()
            .zip(&self.scale)
            .map(|(&i, &s)| {
                let x = state[i] / s;
                if self.noise_std > 0.0 {
                    x * self.noise_std.mul_add(rng::normal(rng), 1.0)
                } else {
                    x
                }
            })
            .collect();
        if self.include_time {
            obs.push(elapsed / self.duration);
        }
        obs
    }
}

/// Upper initial bound of each component, at least 1. The product has no
/// meaningful initial range and is scaled like the total substrate.
fn derived_scale(config: &EnvConfig, components: &[usize]) -> Vec<f64> {
    let layout: StateLayout = config.layout();
    let ranges = config.initial.ranges();
    let substrate: f64 = config.initial.substrates.iter().map(|b| b.high).sum();
    components
        .iter()
        .map(|&i| {
            let reference = if i == layout.product() { substrate } else { ranges[i].high };
            reference.max(1.0)
        })
        .collect()
}

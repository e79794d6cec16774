//! # Fixed-Step Integration
//!
//! Advances a [`Kinetics`] model through time. Classical RK4 is the default;
//! explicit Euler exists for cheap experiments and must be selected by name.
//!
//! Every step ends with the same post-processing: a non-finite component is
//! an error, and any component below `floor` is set to zero.

use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, ConfigError, IntegrationError};
use crate::model::{Control, Kinetics};
use crate::trajectory::Trajectory;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Classical fourth-order Runge–Kutta.
    #[default]
    Rk4,
    /// Explicit Euler. First order only: local error is `O(dt²)` instead of
    /// `O(dt⁵)`, and coupled growth/substrate dynamics need a much smaller
    /// `dt` to stay accurate.
    Euler,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub scheme: Scheme,
    /// Sub-step size (h).
    pub dt: f64,
    /// Components below this value are set to zero after each step.
    pub floor: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Rk4,
            dt: 0.05,
            floor: 1e-12,
        }
    }
}

impl IntegratorConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `dt` is not positive or `floor` is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("dt", self.dt)?;
        require_non_negative("floor", self.floor)
    }
}

#[derive(Clone, Debug)]
pub struct Integrator {
    config: IntegratorConfig,
}

impl Integrator {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn new(config: IntegratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// RK4 with the default floor and the given sub-step.
    ///
    /// # Panics
    ///
    /// Panics if `dt` is not finite and positive.
    #[must_use]
    pub fn rk4(dt: f64) -> Self {
        assert!(dt.is_finite() && dt > 0.0, "dt must be finite and positive");
        Self {
            config: IntegratorConfig {
                dt,
                ..IntegratorConfig::default()
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    /// Number of sub-steps needed to cover `duration`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn substeps(&self, duration: f64) -> usize {
        if duration <= 0.0 {
            return 0;
        }
        // Tolerate representation error so 2.0 / 0.05 is 40 steps, not 41.
        let ratio = duration / self.config.dt;
        let rounded = ratio.round();
        if (ratio - rounded).abs() < 1e-9 * ratio.max(1.0) {
            rounded as usize
        } else {
            ratio.ceil() as usize
        }
    }

    /// Advances `state` by exactly one step of size `dt`.
    ///
    /// # Errors
    ///
    /// [`IntegrationError::DimensionMismatch`] if `state` does not match the
    /// model, [`IntegrationError::InvalidStep`] for a non-positive or
    /// non-finite `dt`, [`IntegrationError::NonFinite`] if the result
    /// contains NaN or infinity.
    pub fn integrate<K: Kinetics + ?Sized>(
        &self,
        model: &K,
        state: &[f64],
        control: &Control,
        dt: f64,
    ) -> Result<Vec<f64>, IntegrationError> {
        let dim = model.dim();
        if state.len() != dim {
            return Err(IntegrationError::DimensionMismatch {
                expected: dim,
                actual: state.len(),
            });
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(IntegrationError::InvalidStep(dt));
        }
        let mut next = match self.config.scheme {
            Scheme::Rk4 => rk4_step(model, state, control, dt),
            Scheme::Euler => euler_step(model, state, control, dt),
        };
        for (index, value) in next.iter_mut().enumerate() {
            if !value.is_finite() {
                return Err(IntegrationError::NonFinite {
                    index,
                    value: *value,
                });
            }
            if *value < self.config.floor {
                *value = 0.0;
            }
        }
        Ok(next)
    }

    /// Advances `state` over `duration` with sub-steps of the configured
    /// `dt`; the last sub-step is shortened to land exactly on `duration`.
    ///
    /// # Errors
    ///
    /// Any step error wrapped in [`IntegrationError::AtSubstep`].
    pub fn advance<K: Kinetics + ?Sized>(
        &self,
        model: &K,
        state: &[f64],
        control: &Control,
        duration: f64,
    ) -> Result<Vec<f64>, IntegrationError> {
        let mut current = state.to_vec();
        self.walk(model, control, duration, &mut current, |_, _| {})?;
        Ok(current)
    }

    /// Like [`Integrator::advance`] but records every sample, starting with
    /// `(t0, state)`.
    ///
    /// # Errors
    ///
    /// Any step error wrapped in [`IntegrationError::AtSubstep`].
    pub fn trajectory<K: Kinetics + ?Sized>(
        &self,
        model: &K,
        state: &[f64],
        control: &Control,
        t0: f64,
        duration: f64,
    ) -> Result<Trajectory, IntegrationError> {
        let mut trajectory = Trajectory::with_capacity(self.substeps(duration) + 1);
        trajectory.push(t0, state.to_vec());
        let mut current = state.to_vec();
        self.walk(model, control, duration, &mut current, |elapsed, s| {
            trajectory.push(t0 + elapsed, s.to_vec());
        })?;
        Ok(trajectory)
    }

    fn walk<K: Kinetics + ?Sized>(
        &self,
        model: &K,
        control: &Control,
        duration: f64,
        current: &mut Vec<f64>,
        mut on_step: impl FnMut(f64, &[f64]),
    ) -> Result<(), IntegrationError> {
        let n = self.substeps(duration);
        let mut elapsed = 0.0;
        for substep in 0..n {
            let h = if substep + 1 == n {
                duration - elapsed
            } else {
                self.config.dt.min(duration - elapsed)
            };
            *current = self
                .integrate(model, current.as_slice(), control, h)
                .map_err(|source| IntegrationError::AtSubstep {
                    substep,
                    source: Box::new(source),
                })?;
            elapsed += h;
            on_step(elapsed, current.as_slice());
        }
        Ok(())
    }
}

fn euler_step<K: Kinetics + ?Sized>(model: &K, y: &[f64], control: &Control, dt: f64) -> Vec<f64> {
    let k = model.derivative(y, control);
    y.iter().zip(&k).map(|(&yi, &ki)| dt.mul_add(ki, yi)).collect()
}

fn rk4_step<K: Kinetics + ?Sized>(model: &K, y: &[f64], control: &Control, dt: f64) -> Vec<f64> {
    let half_dt = 0.5 * dt;
    let stage = |k: &[f64], h: f64| -> Vec<f64> {
        y.iter().zip(k).map(|(&yi, &ki)| h.mul_add(ki, yi)).collect()
    };

    let k1 = model.derivative(y, control);
    let k2 = model.derivative(&stage(&k1, half_dt), control);
    let k3 = model.derivative(&stage(&k2, half_dt), control);
    let k4 = model.derivative(&stage(&k3, dt), control);

    let sixth_dt = dt / 6.0;
    y.iter()
        .enumerate()
        .map(|(i, &yi)| {
            let slope = 2.0f64.mul_add(k2[i] + k3[i], k1[i] + k4[i]);
            sixth_dt.mul_add(slope, yi)
        })
        .collect()
}

//! # Mixed-Culture Kinetic Model
//!
//! Right-hand side of the reactor ODE system. With `c⁺ = max(c, 0)` and the
//! dilution rate `D = F / V⁺`:
//!
//! ```text
//! μ_i   = μmax_i · S⁺/(Ks_i + S⁺ + S⁺²/Ki_i) · Kp_i/(Kp_i + P⁺) · fT_i · fpH_i · max(0, 1 + Σ_k a_ik X_k⁺)
//! dX_i  = (μ_i − kd_i − D) · X_i⁺
//! dS_j  = −Σ_{i on j} (μ_i / Yxs_i + ms_i · S⁺/(Ks_i + S⁺)) · X_i⁺ + D · (S_feed_j − S_j⁺)
//! dP    = Σ_i (α_i · μ_i + β_i) · X_i⁺ − D · P⁺
//! dV    = F
//! ```
//!
//! Negative inputs are read as zero, so numerical undershoot never produces
//! negative rates.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::{KineticParams, SpeciesParams};
use crate::state::StateLayout;

/// Process inputs applied over one integration span.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Feed flow (L/h).
    pub feed_rate: f64,
    /// Broth temperature (°C).
    pub temperature: f64,
    /// pH setpoint.
    pub ph: f64,
}

impl Control {
    pub const DIM: usize = 3;

    /// No feed at the given temperature and pH.
    #[must_use]
    pub const fn batch(temperature: f64, ph: f64) -> Self {
        Self {
            feed_rate: 0.0,
            temperature,
            ph,
        }
    }

    /// Builds a control from `[feed_rate, temperature, ph]`.
    #[must_use]
    pub const fn from_array(values: [f64; 3]) -> Self {
        Self {
            feed_rate: values[0],
            temperature: values[1],
            ph: values[2],
        }
    }
}

/// A pure state-derivative function.
///
/// Implementations must be deterministic and side-effect free; integrators
/// are generic over this trait so the time-stepping scheme can change
/// without touching model logic.
pub trait Kinetics {
    fn layout(&self) -> StateLayout;

    fn dim(&self) -> usize {
        self.layout().dim()
    }

    /// Writes `d(state)/dt` into `out`. `state` and `out` have length
    /// [`Kinetics::dim`].
    fn derivative_into(&self, state: &[f64], control: &Control, out: &mut [f64]);

    fn derivative(&self, state: &[f64], control: &Control) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.derivative_into(state, control, &mut out);
        out
    }
}

/// Kinetic model of several populations in one fed-batch reactor.
///
/// Owns its parameters; they are validated on construction and immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct MixedCultureModel {
    params: KineticParams,
    layout: StateLayout,
}

impl MixedCultureModel {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the parameters fail validation.
    pub fn new(params: KineticParams) -> Result<Self, ConfigError> {
        params.validate()?;
        let layout = StateLayout::new(params.species.len(), params.substrates.len());
        Ok(Self { params, layout })
    }

    /// Specific growth rate `μ_i` of every population at `state`.
    #[must_use]
    pub fn growth_rates(&self, state: &[f64], control: &Control) -> Vec<f64> {
        let product = state[self.layout.product()].max(0.0);
        let biomass = &state[self.layout.biomass()];
        self.params
            .species
            .iter()
            .map(|sp| {
                let s = state[self.layout.substrate(sp.substrate)].max(0.0);
                specific_growth(sp, s, product, biomass, control)
            })
            .collect()
    }

    /// Column labels for this model's state vector.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.layout.labels(
            self.params.species.iter().map(|s| s.name.as_str()),
            self.params.substrates.iter().map(|s| s.name.as_str()),
        )
    }
}

impl Kinetics for MixedCultureModel {
    fn layout(&self) -> StateLayout {
        self.layout
    }

    fn derivative_into(&self, state: &[f64], control: &Control, out: &mut [f64]) {
        let l = self.layout;
        let product = state[l.product()].max(0.0);
        let volume = state[l.volume()].max(0.0);
        let feed = control.feed_rate.max(0.0);
        let dilution = if volume > 0.0 { feed / volume } else { 0.0 };
        let biomass = &state[l.biomass()];

        out.fill(0.0);
        for (i, sp) in self.params.species.iter().enumerate() {
            let x = biomass[i].max(0.0);
            let si = l.substrate(sp.substrate);
            let s = state[si].max(0.0);
            let mu = specific_growth(sp, s, product, biomass, control);

            out[i] = (mu - sp.death_rate - dilution) * x;
            let maintenance = sp.maintenance * s / (sp.ks + s);
            out[si] -= (mu / sp.yield_biomass + maintenance) * x;
            out[l.product()] += sp.alpha.mul_add(mu, sp.beta) * x;
        }
        for (j, sub) in self.params.substrates.iter().enumerate() {
            let sj = l.substrate(j);
            out[sj] += dilution * (sub.feed_concentration - state[sj].max(0.0));
        }
        out[l.product()] -= dilution * product;
        out[l.volume()] = feed;
    }
}

fn specific_growth(
    sp: &SpeciesParams,
    substrate: f64,
    product: f64,
    biomass: &[f64],
    control: &Control,
) -> f64 {
    let mut saturation = sp.ks + substrate;
    if let Some(ki) = sp.substrate_inhibition {
        saturation += substrate * substrate / ki;
    }
    let monod = substrate / saturation;
    let product_factor = sp.product_inhibition.map_or(1.0, |kp| kp / (kp + product));
    let temperature = sp.temperature.map_or(1.0, |t| t.factor(control.temperature));
    let ph = sp.ph.map_or(1.0, |p| p.factor(control.ph));
    let interaction = (1.0
        + sp
            .interactions
            .iter()
            .zip(biomass)
            .map(|(a, x)| a * x.max(0.0))
            .sum::<f64>())
    .max(0.0);
    sp.mu_max * monod * product_factor * temperature * ph * interaction
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wine() -> MixedCultureModel {
        MixedCultureModel::new(KineticParams::wine_like()).unwrap()
    }

    #[test]
    fn derivative_is_finite_on_typical_states() {
        let model = wine();
        let control = Control { feed_rate: 0.02, temperature: 25.0, ph: 4.0 };
        for state in [
            vec![0.2, 0.02, 100.0, 3.0, 0.0, 1.0],
            vec![5.0, 1.0, 0.0, 0.0, 80.0, 1.8],
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![1e6, 1e6, 1e6, 1e6, 1e6, 1e-9],
        ] {
            let d = model.derivative(&state, &control);
            assert!(d.iter().all(|v| v.is_finite()), "{state:?} -> {d:?}");
        }
    }

    #[test]
    fn negative_component_reads_as_zero() {
        let model = wine();
        let control = Control { feed_rate: 0.01, temperature: 26.0, ph: 4.2 };
        let base = vec![0.3, 0.05, 50.0, 2.0, 10.0, 1.2];
        for idx in 0..base.len() {
            let mut negative = base.clone();
            negative[idx] = -0.7;
            let mut floored = base.clone();
            floored[idx] = 0.0;
            assert_eq!(
                model.derivative(&negative, &control),
                model.derivative(&floored, &control),
                "component {idx}"
            );
        }
    }

    #[test]
    fn batch_growth_consumes_substrate() {
        let model = MixedCultureModel::new(KineticParams::two_species_example()).unwrap();
        let d = model.derivative(&[0.5, 0.5, 10.0, 0.0, 1.0], &Control::batch(30.0, 5.5));
        assert!(d[0] > 0.0 && d[1] > 0.0);
        assert!(d[2] < 0.0);
        assert!(d[3] > 0.0);
        assert_eq!(d[4], 0.0);
    }

    #[test]
    fn substrate_balance_matches_yields() {
        let model = MixedCultureModel::new(KineticParams::two_species_example()).unwrap();
        let state = [0.4, 0.2, 5.0, 0.0, 1.0];
        let control = Control::batch(30.0, 5.5);
        let mu = model.growth_rates(&state, &control);
        let d = model.derivative(&state, &control);
        let expected = -(mu[0] / 0.5 * 0.4 + mu[1] / 0.4 * 0.2);
        assert_relative_eq!(d[2], expected, epsilon = 1e-12);
    }

    #[test]
    fn feed_dilutes_and_adds_volume() {
        let model = MixedCultureModel::new(KineticParams::two_species_example()).unwrap();
        let control = Control { feed_rate: 0.1, temperature: 30.0, ph: 5.5 };
        let state = [0.0, 0.0, 10.0, 2.0, 2.0];
        let d = model.derivative(&state, &control);
        // D = 0.05; no biomass, so only dilution and feed act.
        assert_relative_eq!(d[2], 0.05 * (100.0 - 10.0), epsilon = 1e-12);
        assert_relative_eq!(d[3], -0.05 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(d[4], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn product_inhibition_slows_growth() {
        let model = wine();
        let control = Control::batch(28.0, 4.5);
        let clean = model.growth_rates(&[1.0, 0.1, 50.0, 3.0, 0.0, 1.0], &control);
        let inhibited = model.growth_rates(&[1.0, 0.1, 50.0, 3.0, 40.0, 1.0], &control);
        assert_relative_eq!(inhibited[0], clean[0] * 0.5, epsilon = 1e-12);
        assert!(inhibited[1] < clean[1]);
    }

    #[test]
    fn temperature_away_from_optimum_slows_growth() {
        let model = wine();
        let state = [1.0, 0.1, 50.0, 3.0, 0.0, 1.0];
        let at_opt = model.growth_rates(&state, &Control::batch(28.0, 4.5));
        let cold = model.growth_rates(&state, &Control::batch(15.0, 4.5));
        assert!(cold[0] < at_opt[0]);
    }

    #[test]
    fn zero_volume_disables_dilution() {
        let model = wine();
        let control = Control { feed_rate: 0.05, temperature: 25.0, ph: 4.0 };
        let d = model.derivative(&[0.1, 0.0, 10.0, 0.0, 1.0, 0.0], &control);
        assert!(d.iter().all(|v| v.is_finite()));
        assert_relative_eq!(d[5], 0.05);
    }
}

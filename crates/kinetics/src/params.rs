//! # Kinetic Parameters
//!
//! Constants for every population and substrate pool in the reactor. The
//! structures are plain data (serde-friendly) and are checked once by
//! [`KineticParams::validate`] before a model is built from them.

use serde::{Deserialize, Serialize};

use crate::error::{require_finite, require_non_negative, require_positive, ConfigError};

/// Gaussian response of growth to an environmental variable.
///
/// The factor is `exp(-((x - optimum) / width)^2)`: `1.0` at the optimum,
/// decaying on both sides.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Optimum {
    pub optimum: f64,
    pub width: f64,
}

impl Optimum {
    #[must_use]
    pub const fn new(optimum: f64, width: f64) -> Self {
        Self { optimum, width }
    }

    #[must_use]
    pub fn factor(&self, x: f64) -> f64 {
        let z = (x - self.optimum) / self.width;
        (-z * z).exp()
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        require_finite(&format!("{field}.optimum"), self.optimum)?;
        require_positive(&format!("{field}.width"), self.width)
    }
}

/// Constants for one microbial population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    pub name: String,
    /// Maximum specific growth rate (1/h).
    pub mu_max: f64,
    /// Monod saturation constant on the consumed substrate (g/L).
    pub ks: f64,
    /// Index of the substrate pool this population grows on.
    pub substrate: usize,
    /// Biomass yield on substrate (g biomass / g substrate).
    pub yield_biomass: f64,
    /// Substrate maintenance coefficient (g substrate / g biomass / h).
    #[serde(default)]
    pub maintenance: f64,
    /// First-order death rate (1/h).
    #[serde(default)]
    pub death_rate: f64,
    /// Growth-associated product coefficient (g product / g biomass).
    #[serde(default)]
    pub alpha: f64,
    /// Non-growth-associated product rate (g product / g biomass / h).
    #[serde(default)]
    pub beta: f64,
    /// Haldane substrate inhibition constant (g/L).
    #[serde(default)]
    pub substrate_inhibition: Option<f64>,
    /// Product inhibition constant (g/L); growth is scaled by `kp / (kp + P)`.
    #[serde(default)]
    pub product_inhibition: Option<f64>,
    /// Temperature response; `None` means growth ignores temperature.
    #[serde(default)]
    pub temperature: Option<Optimum>,
    /// pH response; `None` means growth ignores pH.
    #[serde(default)]
    pub ph: Option<Optimum>,
    /// Interaction coefficients `a_ik` (L/g) against every population,
    /// including itself. Empty means no interaction.
    #[serde(default)]
    pub interactions: Vec<f64>,
}

impl SpeciesParams {
    /// A substrate-limited population with no inhibition, no environmental
    /// sensitivity and no product formation.
    #[must_use]
    pub fn monod(name: &str, mu_max: f64, ks: f64, substrate: usize, yield_biomass: f64) -> Self {
        Self {
            name: name.to_string(),
            mu_max,
            ks,
            substrate,
            yield_biomass,
            maintenance: 0.0,
            death_rate: 0.0,
            alpha: 0.0,
            beta: 0.0,
            substrate_inhibition: None,
            product_inhibition: None,
            temperature: None,
            ph: None,
            interactions: Vec::new(),
        }
    }

    fn validate(&self, field: &str, species: usize, substrates: usize) -> Result<(), ConfigError> {
        require_non_negative(&format!("{field}.mu_max"), self.mu_max)?;
        require_positive(&format!("{field}.ks"), self.ks)?;
        require_positive(&format!("{field}.yield_biomass"), self.yield_biomass)?;
        require_non_negative(&format!("{field}.maintenance"), self.maintenance)?;
        require_non_negative(&format!("{field}.death_rate"), self.death_rate)?;
        require_non_negative(&format!("{field}.alpha"), self.alpha)?;
        require_non_negative(&format!("{field}.beta"), self.beta)?;
        if self.substrate >= substrates {
            return Err(ConfigError::new(
                format!("{field}.substrate"),
                format!("index {} out of range for {substrates} substrate(s)", self.substrate),
            ));
        }
        if let Some(ki) = self.substrate_inhibition {
            require_positive(&format!("{field}.substrate_inhibition"), ki)?;
        }
        if let Some(kp) = self.product_inhibition {
            require_positive(&format!("{field}.product_inhibition"), kp)?;
        }
        if let Some(t) = &self.temperature {
            t.validate(&format!("{field}.temperature"))?;
        }
        if let Some(ph) = &self.ph {
            ph.validate(&format!("{field}.ph"))?;
        }
        if !self.interactions.is_empty() && self.interactions.len() != species {
            return Err(ConfigError::new(
                format!("{field}.interactions"),
                format!("expected {species} coefficients, got {}", self.interactions.len()),
            ));
        }
        for (k, a) in self.interactions.iter().enumerate() {
            require_finite(&format!("{field}.interactions[{k}]"), *a)?;
        }
        Ok(())
    }
}

/// A substrate pool and the concentration at which it is fed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstrateParams {
    pub name: String,
    /// Concentration of this substrate in the feed stream (g/L).
    #[serde(default)]
    pub feed_concentration: f64,
}

impl SubstrateParams {
    #[must_use]
    pub fn new(name: &str, feed_concentration: f64) -> Self {
        Self {
            name: name.to_string(),
            feed_concentration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KineticParams {
    pub species: Vec<SpeciesParams>,
    pub substrates: Vec<SubstrateParams>,
}

impl KineticParams {
    /// Checks every constant; the error names the first offending field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a constant is non-finite or outside its
    /// physical range, an index is out of range, or a population list is
    /// empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.species.is_empty() {
            return Err(ConfigError::new("species", "at least one species is required"));
        }
        if self.substrates.is_empty() {
            return Err(ConfigError::new("substrates", "at least one substrate is required"));
        }
        let n = self.species.len();
        let m = self.substrates.len();
        for (i, sp) in self.species.iter().enumerate() {
            sp.validate(&format!("species[{i}]"), n, m)?;
        }
        for (j, sub) in self.substrates.iter().enumerate() {
            require_non_negative(&format!("substrates[{j}].feed_concentration"), sub.feed_concentration)?;
        }
        Ok(())
    }

    /// Two populations sharing one substrate, no inhibition and no
    /// environmental sensitivity. In batch mode biomass rises and substrate
    /// falls monotonically until the substrate is exhausted.
    #[must_use]
    pub fn two_species_example() -> Self {
        let mut fast = SpeciesParams::monod("fast", 0.5, 0.5, 0, 0.5);
        fast.alpha = 0.2;
        let mut slow = SpeciesParams::monod("slow", 0.3, 1.0, 0, 0.4);
        slow.alpha = 0.1;
        Self {
            species: vec![fast, slow],
            substrates: vec![SubstrateParams::new("glucose", 100.0)],
        }
    }

    /// Yeast and a lactic acid bacterium in a must-like medium: the yeast
    /// ferments sugar to ethanol, the bacterium grows on malic acid and is
    /// strongly inhibited by ethanol and by yeast biomass.
    #[must_use]
    pub fn wine_like() -> Self {
        let yeast = SpeciesParams {
            name: "yeast".to_string(),
            mu_max: 0.35,
            ks: 1.5,
            substrate: 0,
            yield_biomass: 0.1,
            maintenance: 0.05,
            death_rate: 0.005,
            alpha: 4.0,
            beta: 0.1,
            substrate_inhibition: Some(150.0),
            product_inhibition: Some(40.0),
            temperature: Some(Optimum::new(28.0, 10.0)),
            ph: Some(Optimum::new(4.5, 2.0)),
            interactions: Vec::new(),
        };
        let bacterium = SpeciesParams {
            name: "lactic".to_string(),
            mu_max: 0.08,
            ks: 0.5,
            substrate: 1,
            yield_biomass: 0.3,
            maintenance: 0.0,
            death_rate: 0.002,
            alpha: 0.0,
            beta: 0.0,
            substrate_inhibition: None,
            product_inhibition: Some(10.0),
            temperature: Some(Optimum::new(22.0, 8.0)),
            ph: Some(Optimum::new(3.8, 1.0)),
            interactions: vec![-0.05, 0.0],
        };
        Self {
            species: vec![yeast, bacterium],
            substrates: vec![
                SubstrateParams::new("sugar", 300.0),
                SubstrateParams::new("malic_acid", 0.0),
            ],
        }
    }
}

impl Default for KineticParams {
    fn default() -> Self {
        Self::wine_like()
    }
}

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Layout of the reactor state vector.
///
/// | Index | Variable | Unit |
/// |-------|----------|------|
/// | `0..n` | biomass `X_i` per species | g/L |
/// | `n..n+m` | substrate `S_j` per pool | g/L |
/// | `n+m` | product `P` | g/L |
/// | `n+m+1` | broth volume `V` | L |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLayout {
    pub species: usize,
    pub substrates: usize,
}

impl StateLayout {
    #[must_use]
    pub const fn new(species: usize, substrates: usize) -> Self {
        Self { species, substrates }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.species + self.substrates + 2
    }

    #[must_use]
    pub const fn biomass(&self) -> Range<usize> {
        0..self.species
    }

    #[must_use]
    pub const fn substrates(&self) -> Range<usize> {
        self.species..self.species + self.substrates
    }

    #[must_use]
    pub const fn substrate(&self, j: usize) -> usize {
        self.species + j
    }

    #[must_use]
    pub const fn product(&self) -> usize {
        self.species + self.substrates
    }

    #[must_use]
    pub const fn volume(&self) -> usize {
        self.species + self.substrates + 1
    }

    #[must_use]
    pub fn total_biomass(&self, state: &[f64]) -> f64 {
        state[self.biomass()].iter().map(|x| x.max(0.0)).sum()
    }

    #[must_use]
    pub fn total_substrate(&self, state: &[f64]) -> f64 {
        state[self.substrates()].iter().map(|s| s.max(0.0)).sum()
    }

    /// Product mass in the reactor (g), `P * V`.
    #[must_use]
    pub fn product_mass(&self, state: &[f64]) -> f64 {
        state[self.product()].max(0.0) * state[self.volume()].max(0.0)
    }

    /// Substrate mass in the reactor (g), `sum(S_j) * V`.
    #[must_use]
    pub fn substrate_mass(&self, state: &[f64]) -> f64 {
        self.total_substrate(state) * state[self.volume()].max(0.0)
    }

    /// Column labels in state order, e.g. `X[yeast]`, `S[sugar]`, `P`, `V`.
    #[must_use]
    pub fn labels<'a>(
        &self,
        species: impl IntoIterator<Item = &'a str>,
        substrates: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut labels: Vec<String> = species.into_iter().map(|s| format!("X[{s}]")).collect();
        labels.extend(substrates.into_iter().map(|s| format!("S[{s}]")));
        labels.push("P".to_string());
        labels.push("V".to_string());
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_contiguous() {
        let l = StateLayout::new(3, 2);
        assert_eq!(l.dim(), 7);
        assert_eq!(l.biomass(), 0..3);
        assert_eq!(l.substrates(), 3..5);
        assert_eq!(l.substrate(1), 4);
        assert_eq!(l.product(), 5);
        assert_eq!(l.volume(), 6);
    }

    #[test]
    fn masses_ignore_negative_noise() {
        let l = StateLayout::new(1, 2);
        let state = [1.0, 4.0, -1e-9, 2.0, 0.5];
        assert!((l.total_substrate(&state) - 4.0).abs() < 1e-12);
        assert!((l.product_mass(&state) - 1.0).abs() < 1e-12);
        assert!((l.substrate_mass(&state) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn labels_follow_state_order() {
        let l = StateLayout::new(2, 1);
        let labels = l.labels(["a", "b"], ["glc"]);
        assert_eq!(labels, vec!["X[a]", "X[b]", "S[glc]", "P", "V"]);
    }
}

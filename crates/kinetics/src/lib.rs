//! # Mixed-Culture Kinetics
//!
//! Mechanistic kinetic model and fixed-step integrator for mixed-culture
//! fermentations.
//!
//! This crate is the numerical foundation of the workspace. It describes a
//! fed-batch reactor holding several microbial populations that compete for
//! one or more substrate pools and form a common product, and it advances that
//! description through time with an explicit Runge–Kutta scheme.
//!
//! ## Key Components
//!
//! -   **Parameters:** [`KineticParams`] groups per-species constants
//!     ([`SpeciesParams`]) and per-substrate feed data ([`SubstrateParams`]).
//!     Parameters are validated once and never change afterwards.
//! -   **Model:** [`MixedCultureModel`] implements the [`Kinetics`] trait, a
//!     pure mapping from `(state, control)` to the state derivative. Growth is
//!     Monod-type with optional Haldane substrate inhibition, optional product
//!     inhibition, temperature and pH factors, and pairwise population
//!     interactions. Product formation follows Luedeking–Piret.
//! -   **Integration:** [`Integrator`] advances any [`Kinetics`] implementation
//!     by classical RK4 (or explicit Euler when explicitly requested), floors
//!     tiny negative concentrations to zero and reports non-finite results as
//!     [`IntegrationError`].
//!
//! ## Usage
//!
//! ```rust
//! use kinetics::{Control, Integrator, KineticParams, MixedCultureModel};
//!
//! let model = MixedCultureModel::new(KineticParams::two_species_example())?;
//! let integrator = Integrator::rk4(0.05);
//! let state = vec![0.1, 0.1, 20.0, 0.0, 1.0];
//! let next = integrator.advance(&model, &state, &Control::batch(30.0, 5.5), 1.0)?;
//! assert!(next[0] > state[0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod integrator;
pub mod model;
pub mod params;
pub mod state;
pub mod trajectory;

pub use error::{ConfigError, IntegrationError};
pub use integrator::{Integrator, IntegratorConfig, Scheme};
pub use model::{Control, Kinetics, MixedCultureModel};
pub use params::{KineticParams, Optimum, SpeciesParams, SubstrateParams};
pub use state::StateLayout;
pub use trajectory::Trajectory;

//! # Bioreactor Environment
//!
//! Wraps the kinetic model and integrator from [`kinetics`] into an
//! episodic decision process that implements [`ml::Env`]. Agents propose a
//! feed rate, temperature and pH setpoint; the environment clips the
//! proposal to its bounds, integrates the reactor over one decision
//! interval, and scores the step with a configurable [`RewardFunction`].

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod env;
pub mod observation;
pub mod reward;

pub use config::{ActionBounds, EnvConfig, Feasibility, InitialConditions, ObservationConfig};
pub use env::{FermentationEnv, StepInfo, Termination, ACTION_LABELS};
pub use kinetics::ConfigError;
pub use observation::Observer;
pub use reward::{RewardBreakdown, RewardFunction, RewardInputs, RewardWeights};

//! # Learning Agents
//!
//! Controllers that learn from environment interaction. This crate knows
//! nothing about bioprocesses: agents see only the [`Env`] contract, which
//! gives observation vectors, action bounds and scalar rewards.
//!
//! - [`Agent`] is the capability set every controller implements
//!   (`act`, `update`, mode switching).
//! - [`ActorCritic`] is a Gaussian policy with a learned value baseline.
//! - [`FixedAgent`] always proposes the same action.
//! - [`SharedAgent`] lets parallel workers act on one parameter set.
//!
//! All randomness flows through caller-owned [`fastrand::Rng`] instances.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actor_critic;
pub mod agent;
pub mod env;
pub mod fixed;
pub mod nn;
pub mod optim;
pub mod replay;
pub mod rng;
pub mod shared;
pub mod transition;

pub use actor_critic::{ActorCritic, ActorCriticConfig};
pub use agent::{Agent, AgentError, Mode, UpdateMetrics};
pub use env::{Bounds, EpisodeEnd, Env, Snapshot, Step};
pub use fixed::FixedAgent;
pub use replay::ReplayBuffer;
pub use shared::SharedAgent;
pub use transition::Transition;

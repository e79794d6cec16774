//! # Training
//!
//! Episode loop, update scheduling and run statistics for any
//! [`ml::Agent`] acting in any [`ml::Env`].
//!
//! [`Trainer`] runs episodes sequentially and returns a [`TrainingReport`];
//! [`parallel`] collects independent episodes on a rayon pool against a
//! [`ml::SharedAgent`].

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod metrics;
pub mod parallel;
pub mod stop;
pub mod trainer;

pub use metrics::{
    Convergence, EpisodeSummary, FailureKind, FatalFailure, MovingAverage, Outcome, StepRecord, TrainingReport,
};
pub use parallel::{collect_episodes, train_in_rounds, EpisodeRollout};
pub use stop::StopToken;
pub use trainer::{episode_seeds, ReplayConfig, TrainError, Trainer, TrainerConfig, UpdateSchedule};

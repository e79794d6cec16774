//! # fermrl
//!
//! Trains a fermentation controller from a JSON configuration and reports
//! the run. Logs go to stderr (`RUST_LOG`, default `info`); `--json` prints
//! the full session to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fermrl::app::{self, Controller};
use fermrl::RunConfig;
use rl::StopToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fermrl")]
#[command(about = "Train a feeding and temperature/pH policy on a simulated mixed-culture fermentation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Run configuration (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Override every seed in the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Deterministic evaluation episodes after training
    #[arg(long, default_value = "0")]
    evaluate: usize,

    /// Run the fixed midpoint controller instead of the actor-critic
    #[arg(long)]
    baseline: bool,

    /// Print the session as JSON to stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(episodes) = args.episodes {
        config.trainer.episodes = episodes;
    }
    if let Some(seed) = args.seed {
        config.reseed(seed);
    }
    let controller = if args.baseline {
        Controller::Baseline
    } else {
        Controller::ActorCritic
    };

    let session = app::run(&config, controller, args.evaluate, &StopToken::new())?;
    if args.json {
        let json = serde_json::to_string_pretty(&session).context("failed to serialize session")?;
        println!("{json}");
    }
    app::finish(&session)
}

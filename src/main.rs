mod analysis;
mod config;
mod engine;
mod gate;
mod geometry;
mod manager;
mod model;
mod record;
mod stats;

use crate::config::Overrides;
use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run {
        /// Maximum number of rounds, overriding the configuration file.
        #[arg(long)]
        rounds: Option<u32>,

        /// Number of sheep, overriding the configuration file.
        #[arg(long)]
        sheep: Option<usize>,

        /// Pause for user acknowledgment at the end of each round.
        #[arg(long)]
        wait: bool,
    },

    Analyze,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run {
            rounds,
            sheep,
            wait,
        } => {
            let overrides = Overrides {
                max_rounds: rounds,
                n_sheep: sheep,
            };
            mgr.run_simulation(overrides, wait)?
        }
        Command::Analyze => mgr.analyze_sim()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}

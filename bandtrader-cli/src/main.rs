//! bandtrader CLI: replay bars through the engine against a paper broker.
//!
//! Commands:
//! - `replay`: run a CSV bar file through the engine
//! - `synthetic`: run a seeded random walk through the engine
//! - `config`: print or write the default configuration

mod logging;
mod replay;

use anyhow::{Context, Result};
use bandtrader_core::data::{load_bars_csv, synthetic_bars, SyntheticParams};
use bandtrader_core::domain::Bar;
use bandtrader_core::EngineConfig;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "bandtrader",
    about = "bandtrader: band breakout signal and execution engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunOptions {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting account balance.
    #[arg(long, default_value_t = 10_000.0)]
    balance: f64,

    /// Simulated spread in points.
    #[arg(long, default_value_t = 10)]
    spread_points: u32,

    /// Write the JSON summary to this file as well.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Per-tick diagnostics (also sets the config's verbose flag).
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay bars from a CSV file (timestamp,open,high,low,close,tick_volume).
    Replay {
        #[arg(long)]
        bars: PathBuf,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Replay a seeded synthetic random walk.
    Synthetic {
        /// Number of bars to generate.
        #[arg(long, default_value_t = 5_000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Print the default configuration as TOML.
    Config {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { bars, run } => {
            logging::init_logging(run.verbose, run.log_json);
            let config = load_config(run.config.as_deref(), run.verbose)?;
            let loaded = load_bars_csv(&bars)
                .with_context(|| format!("loading bars from {}", bars.display()))?;
            run_with(config, loaded, &run)
        }
        Commands::Synthetic { bars, seed, run } => {
            logging::init_logging(run.verbose, run.log_json);
            let config = load_config(run.config.as_deref(), run.verbose)?;
            let params = SyntheticParams {
                timeframe: config.timeframe,
                ..SyntheticParams::default()
            };
            run_with(config, synthetic_bars(bars, seed, &params), &run)
        }
        Commands::Config { output } => {
            let text = EngineConfig::default().to_toml_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Default config written to: {}", path.display());
                }
                None => print!("{text}"),
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.verbose |= verbose;
    Ok(config)
}

fn run_with(config: EngineConfig, bars: Vec<Bar>, run: &RunOptions) -> Result<()> {
    let summary = replay::run_replay(config, bars, run.balance, run.spread_points)?;
    let json = serde_json::to_string_pretty(&summary)?;
    println!("{json}");
    if let Some(path) = &run.output {
        std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Summary written to: {}", path.display());
    }
    Ok(())
}

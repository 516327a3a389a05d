// SPDX-License-Identifier: Apache-2.0

//! Irqstream CLI
//!
//! Thin front ends over the irqstream event transport: an event watcher, a
//! live counts-per-second monitor, and a latency benchmark capture. Each one
//! follows the same shape - the real-time callback does the minimum, and
//! everything slow runs on the main thread behind an spsc hop.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use irqstream_core::{Config, ConfigLoader};

mod commands;
mod signals;
mod tui;

const DEFAULT_CONFIG_PATH: &str = "irqstream.yaml";

/// Irqstream - low-latency listener for hardware-triggered event streams
#[derive(Parser)]
#[command(name = "irqstream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Device node to listen on (overrides the config file)
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print each event as it arrives
    Watch,

    /// Live counts-per-second readout
    Monitor {
        /// Show TUI dashboard instead of the single-line readout
        #[arg(short = 'D', long)]
        dashboard: bool,
    },

    /// Capture inter-event deltas for latency and jitter analysis
    Bench {
        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short = 't', long)]
        duration: Option<u64>,

        /// Output file for the raw deltas (default: timestamped .dat)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a JSON summary to stdout when done
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // An explicitly given config path must exist; the default one is optional.
    let mut config: Config = if cli.config == DEFAULT_CONFIG_PATH {
        ConfigLoader::load_optional(&cli.config)?
    } else {
        ConfigLoader::load_file(&cli.config)?
    };
    if let Some(device) = cli.device {
        config.listener.device_path = device;
    }
    tracing::debug!(device = %config.listener.device_path.display(), "Configuration resolved");

    // Dispatch to command handlers
    match cli.command {
        Commands::Watch => commands::watch::execute(&config),
        Commands::Monitor { dashboard } => commands::monitor::execute(&config, dashboard),
        Commands::Bench {
            duration,
            output,
            json,
        } => commands::bench::execute(&config, duration, output, json),
    }
}

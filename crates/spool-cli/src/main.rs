//! Spool CLI - Headless driver for the rope-winding simulation

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{export, profiles, simulate};
use spool_runtime::BridgeMode;

#[derive(Parser)]
#[command(name = "spool")]
#[command(about = "Rope-winding simulation for coiler configurators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available coiler profiles
    Profiles {
        /// Path to a profile catalog (TOML); built-in profiles if omitted
        #[arg(long)]
        config: Option<String>,
    },

    /// Run a winding headlessly and report what happened
    Simulate {
        /// Profile name
        #[arg(short, long)]
        profile: String,

        /// Path to a profile catalog (TOML)
        #[arg(long)]
        config: Option<String>,

        /// Simulated duration in seconds
        #[arg(long, default_value = "60")]
        seconds: f64,

        /// Presentation frame rate
        #[arg(long, default_value = "60")]
        fps: f64,

        /// Simulation transport (worker or local)
        #[arg(long, default_value = "worker")]
        mode: BridgeMode,

        /// Sleep between frames to run in wall-clock time
        #[arg(long)]
        realtime: bool,

        /// Write every simulation response as a JSON line to this file
        #[arg(long)]
        trace: Option<String>,
    },

    /// Wind a profile to completion and write the rope as Wavefront OBJ
    Export {
        /// Profile name
        #[arg(short, long)]
        profile: String,

        /// Output OBJ path
        #[arg(short, long, default_value = "rope.obj")]
        output: String,

        /// Path to a profile catalog (TOML)
        #[arg(long)]
        config: Option<String>,

        /// Give up after this many simulated seconds
        #[arg(long, default_value = "120")]
        seconds: f64,

        /// Simulation transport (worker or local)
        #[arg(long, default_value = "local")]
        mode: BridgeMode,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Profiles { config } => profiles::run(config.as_deref()),
        Commands::Simulate {
            profile,
            config,
            seconds,
            fps,
            mode,
            realtime,
            trace,
        } => simulate::run(simulate::SimulateArgs {
            profile,
            config,
            seconds,
            fps,
            mode,
            realtime,
            trace,
        }),
        Commands::Export {
            profile,
            output,
            config,
            seconds,
            mode,
        } => export::run(export::ExportArgs {
            profile,
            output,
            config,
            seconds,
            mode,
        }),
    }
}

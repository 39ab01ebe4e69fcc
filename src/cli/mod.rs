//! CLI interface for smart-money
//!
//! Provides subcommands for:
//! - `run`: Live detection over the configured symbols
//! - `detect`: One out-of-cycle detection for a symbol
//! - `config`: Show the effective configuration

mod detect;
mod run;

pub use detect::DetectArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "smart-money")]
#[command(about = "Smart-money phase detection for crypto perpetual futures")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start live detection
    Run(RunArgs),
    /// Run a single detection and print the resulting state
    Detect(DetectArgs),
    /// Show effective configuration
    Config,
}

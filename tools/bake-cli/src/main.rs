//! Skinbake CLI - Developer tool for the skin bake/unbake pipeline
//!
//! # Commands
//!
//! - `skinbake roundtrip` - Bake, edit and unbake a procedural skinned tube, reporting the error
//! - `skinbake config` - Print the effective configuration as TOML
//!
//! # Usage
//!
//! ```bash
//! # Default tube, one cycle
//! skinbake roundtrip
//!
//! # Larger mesh, stronger bend, custom configuration
//! skinbake roundtrip --rings 128 --segments 32 --bend 35 --config bake.toml
//!
//! # Show what a partial config file resolves to
//! skinbake config --config bake.toml
//! ```

mod config;
mod roundtrip;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Skinbake CLI - Developer tool for the skin bake/unbake pipeline
#[derive(Parser)]
#[command(name = "skinbake")]
#[command(about = "Developer tool for the skin bake/unbake pipeline")]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake, edit and unbake a procedural skinned tube
    Roundtrip(roundtrip::RoundtripArgs),

    /// Print the effective configuration
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Roundtrip(args) => roundtrip::execute(args),
        Commands::Config(args) => config::execute(args),
    }
}

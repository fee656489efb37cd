//! Config command - print the effective bake configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use skinbake_core::BakeConfig;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration file (TOML); defaults are printed when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Load `path`, or the defaults when no path is given
pub fn load(path: Option<&Path>) -> Result<BakeConfig> {
    match path {
        Some(path) => {
            let config = BakeConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        None => Ok(BakeConfig::default()),
    }
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    let config = load(args.config.as_deref())?;
    print!("{}", config.to_toml_string());
    Ok(())
}

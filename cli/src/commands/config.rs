//! Config command implementation

use anyhow::{Context, Result};
use blurworker_wasm::RelayConfig;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Relay configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Print the effective configuration after file and environment overrides
pub async fn run(args: ConfigArgs) -> Result<()> {
    let config =
        RelayConfig::load(args.config.as_deref()).context("Failed to load relay configuration")?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

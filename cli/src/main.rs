//! CLI for blurworker
//!
//! Commands:
//! - run: relay an image file through a compiled blur module
//! - config: print the effective relay configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "blurworker")]
#[command(about = "blurworker - relay images through a WASM blur module", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay a file through a module and write its output
    Run(commands::run::RunArgs),

    /// Print the effective relay configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => {
            init_tracing(args.verbose);
            commands::run::run(args).await
        }
        Commands::Config(args) => commands::config::run(args).await,
    };

    if let Err(e) = &result {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    result
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "blurworker", "run", "-m", "blur.wasm", "-i", "in.png", "-s", "3", "-a",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.sigma, 3.0);
        assert!(args.alpha);
        assert_eq!(args.ext, "png");
        assert_eq!(args.repeat, 1);
    }

    #[test]
    fn test_raw_args_conflict_with_flags() {
        let result = Cli::try_parse_from([
            "blurworker", "run", "-m", "blur.wasm", "-i", "in.png", "-s", "3", "--args", "-s4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config() {
        let cli = Cli::try_parse_from(["blurworker", "config", "-c", "relay.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(_)));
    }
}

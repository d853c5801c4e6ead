//! Run command implementation

use crate::output;
use anyhow::{Context, Result};
use blurworker_shared::utils::format_bytes;
use blurworker_shared::{
    BlurArgs, InboundMessage, ModuleResult, OutboundMessage, DEFAULT_EXTENSION,
};
use blurworker_wasm::{spawn_file_worker, RelayConfig};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compiled blur module (.wasm, or .wat text)
    #[arg(short, long, env = "BLURWORKER_MODULE")]
    pub module: PathBuf,

    /// Image file to send to the module
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the module's output (default: <input>_blurred.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Gaussian sigma; 0 asks the module for no output
    #[arg(short, long, default_value = "0")]
    pub sigma: f32,

    /// Blur the alpha channel too
    #[arg(short, long)]
    pub alpha: bool,

    /// Output encoding
    #[arg(short, long, default_value = DEFAULT_EXTENSION)]
    pub ext: String,

    /// Raw argument string for the module, instead of --sigma/--alpha/--ext
    #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["sigma", "alpha", "ext"])]
    pub args: Option<String>,

    /// Send the same request this many times (for timing)
    #[arg(long, default_value = "1")]
    pub repeat: u32,

    /// Relay configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print one JSON summary line per reply
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// The argument string handed to the module
    pub fn module_args(&self) -> Result<String> {
        if let Some(raw) = &self.args {
            return Ok(raw.clone());
        }

        let args = BlurArgs {
            sigma: self.sigma,
            apply_to_alpha: self.alpha,
            extension: self.ext.clone(),
        };
        args.validate().context("Invalid blur arguments")?;
        Ok(args.to_string())
    }
}

/// One reply, as printed with `--json`
#[derive(Debug, Serialize)]
struct ReplySummary {
    request: u32,
    raw: i32,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<i32>,
    elapsed_ms: f64,
}

impl ReplySummary {
    fn new(request: u32, reply: &OutboundMessage) -> Self {
        let (kind, output_bytes, error_code) = match &reply.result {
            ModuleResult::Output(bytes) => ("output", Some(bytes.len()), None),
            ModuleResult::Empty => ("empty", None, None),
            ModuleResult::Error(code) => ("error", None, Some(*code)),
            ModuleResult::Unreadable(_) => ("unreadable", None, None),
        };
        Self {
            request,
            raw: reply.raw,
            result: kind,
            output_bytes,
            error_code,
            elapsed_ms: reply.elapsed_ms,
        }
    }
}

/// Min / mean / max over a set of relay timings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
}

impl TimingSummary {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let min_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_ms = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(Self {
            min_ms,
            mean_ms,
            max_ms,
        })
    }
}

/// `photo.png` + `jpg` -> `photo_blurred.jpg`, next to the input
pub fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_blurred.{}", stem, extension))
}

pub async fn run(args: RunArgs) -> Result<()> {
    if args.repeat == 0 {
        anyhow::bail!("--repeat must be at least 1");
    }

    let config =
        RelayConfig::load(args.config.as_deref()).context("Failed to load relay configuration")?;
    debug!("Relay configuration: {:?}", config);

    let module_args = args.module_args()?;
    let payload = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read input {}", args.input.display()))?;

    output::info(&format!(
        "Relaying {} ({}) through {} with \"{}\"",
        args.input.display(),
        format_bytes(payload.len()),
        args.module.display(),
        module_args
    ));

    let handle = spawn_file_worker(config, args.module.clone())?;

    let mut timings = Vec::with_capacity(args.repeat as usize);
    let mut last_output = None;
    for request in 1..=args.repeat {
        let reply = handle
            .post(InboundMessage::new(payload.clone(), module_args.clone()))
            .await
            .context("Relay request failed")?;
        timings.push(reply.elapsed_ms);

        if args.json {
            let summary = ReplySummary::new(request, &reply);
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            output::timing(&format!("request {}:", request), reply.elapsed_ms);
        }

        match reply.result {
            ModuleResult::Error(code) => anyhow::bail!("Module reported error code {}", code),
            ModuleResult::Empty => last_output = None,
            ModuleResult::Output(bytes) => last_output = Some(bytes),
            ModuleResult::Unreadable(raw) => {
                output::warning(&format!(
                    "Module returned {}, which is not an output record",
                    raw
                ));
                last_output = None;
            }
        }
    }

    tokio::task::spawn_blocking(move || handle.shutdown())
        .await
        .context("Relay worker shutdown task failed")??;

    if let Some(summary) = TimingSummary::from_samples(&timings).filter(|_| timings.len() > 1) {
        output::info(&format!(
            "{} requests: min {:.3} ms, mean {:.3} ms, max {:.3} ms",
            timings.len(),
            summary.min_ms,
            summary.mean_ms,
            summary.max_ms
        ));
    }

    match last_output {
        Some(bytes) => {
            let extension = BlurArgs::parse(&module_args).extension;
            let path = args
                .output
                .clone()
                .unwrap_or_else(|| default_output_path(&args.input, &extension));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write output {}", path.display()))?;
            output::success(&format!(
                "Wrote {} to {}",
                format_bytes(bytes.len()),
                path.display()
            ));
        }
        None => output::warning("Module produced no output (is sigma greater than 0?)"),
    }

    Ok(())
}

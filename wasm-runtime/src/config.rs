//! Relay configuration
//!
//! Loaded from an optional TOML file, then overridden by `BLURWORKER_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `BLURWORKER_EXPORTS__ALLOC=malloc`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BLURWORKER";

/// WebAssembly page size in bytes
const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Export names the host looks up on a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportNames {
    /// Linear memory export
    pub memory: String,

    /// Allocator, `(size: u32) -> u32`. Its presence is the readiness signal.
    pub alloc: String,

    /// Entry point, `(args: u32, payload: u32, payload_len: u32) -> i32`
    pub entry: String,

    /// Optional deallocator, `(ptr: u32, len: u32)`, used to release output records
    pub dealloc: Option<String>,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            memory: "memory".to_string(),
            alloc: "alloc".to_string(),
            entry: "start".to_string(),
            dealloc: Some("dealloc".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Delay between readiness checks while the module initializes
    pub poll_interval_ms: u64,

    /// Pending requests a worker accepts before `post` waits
    pub queue_capacity: usize,

    /// Fuel granted to each guest call (None = unmetered)
    pub fuel_per_call: Option<u64>,

    /// Upper bound on linear memory, in 64 KiB pages (None = module's own limit)
    pub max_memory_pages: Option<u32>,

    pub exports: ExportNames,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            queue_capacity: 16,
            fuel_per_call: None,
            max_memory_pages: None,
            exports: ExportNames::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config: RelayConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Linear memory bound in bytes, if configured
    pub fn max_memory_bytes(&self) -> Option<usize> {
        self.max_memory_pages
            .map(|pages| pages as usize * WASM_PAGE_SIZE)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if self.fuel_per_call == Some(0) {
            anyhow::bail!("fuel_per_call must be greater than 0 when set");
        }

        let exports = &self.exports;
        for (key, name) in [
            ("memory", &exports.memory),
            ("alloc", &exports.alloc),
            ("entry", &exports.entry),
        ] {
            if name.is_empty() {
                anyhow::bail!("exports.{} must not be empty", key);
            }
        }

        Ok(())
    }
}

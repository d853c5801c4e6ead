//! WASM module host and request relay
//!
//! Loads a compiled blur module with wasmtime and relays requests into it:
//! each request's argument string and payload are copied into the module's
//! linear memory, the module's entry point is called once, and the result is
//! returned together with the elapsed time.
//!
//! - [`runtime`]: compiling and instantiating modules
//! - [`module`]: the boundary the relay talks to
//! - [`readiness`]: waiting for a module to finish initializing
//! - [`relay`]: the per-request sequence
//! - [`worker`]: a dedicated thread serving one relay over a channel

pub mod config;
pub mod error;
pub mod host;
pub mod module;
pub mod readiness;
pub mod relay;
pub mod runtime;
pub mod worker;

pub use config::{ExportNames, RelayConfig};
pub use error::RelayError;
pub use module::{GuestBuffer, GuestModule};
pub use readiness::{wait_for, ModuleInit, ModuleSlot};
pub use relay::Relay;
pub use runtime::{WasmModule, WasmRuntime};
pub use worker::{RelayHandle, RelayWorker};

use std::path::PathBuf;

/// Start a worker that loads the module at `path` in the background.
pub fn spawn_file_worker(config: RelayConfig, path: PathBuf) -> Result<RelayHandle, RelayError> {
    let runtime_config = config.clone();
    RelayWorker::spawn(config, move || {
        let runtime = WasmRuntime::new(runtime_config)?;
        runtime.load_file(&path)
    })
}

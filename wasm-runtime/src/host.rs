//! Host functions available to blur modules

use anyhow::Result;
use blurworker_shared::utils::time::elapsed_ms;
use std::time::Instant;
use wasmtime::{Caller, Linker, StoreLimits};

/// Per-module data held in the wasmtime store
pub struct HostState {
    /// Name used when logging on behalf of the module
    pub module_name: String,

    /// Instantiation time, the zero point of `env.now_ms`
    pub started: Instant,

    pub limits: StoreLimits,
}

impl HostState {
    pub fn new(module_name: impl Into<String>, limits: StoreLimits) -> Self {
        Self {
            module_name: module_name.into(),
            started: Instant::now(),
            limits,
        }
    }
}

/// Register host functions with the WASM linker
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // Log function for debugging modules
    linker.func_wrap(
        "env",
        "log",
        |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| {
            let Some(memory) = caller.get_export("memory").and_then(|e| e.into_memory()) else {
                return;
            };

            let mut buf = vec![0u8; len as usize];
            if memory.read(&caller, ptr as usize, &mut buf).is_ok() {
                let msg = String::from_utf8_lossy(&buf);
                tracing::debug!("[{}] {}", caller.data().module_name, msg);
            }
        },
    )?;

    // Milliseconds since instantiation, for module-side benchmarks
    linker.func_wrap("env", "now_ms", |caller: Caller<'_, HostState>| -> f64 {
        elapsed_ms(caller.data().started)
    })?;

    Ok(())
}

//! WASM runtime implementation for blur modules.
//!
//! Compiles a module, resolves its memory, allocator and entry point exports,
//! and implements [`GuestModule`] on top of wasmtime so the relay can move
//! buffers into linear memory and call the entry point.

use crate::config::RelayConfig;
use crate::host::{register_host_functions, HostState};
use crate::module::{GuestBuffer, GuestModule};
use anyhow::{Context, Result};
use blurworker_shared::wasm::{decode_output_len, ResultCode, OUTPUT_LEN_PREFIX};
use blurworker_shared::ModuleResult;
use std::path::Path;
use tracing::{debug, warn};
use wasmtime::{Config, Engine, Linker, Memory, Module, Store, StoreLimitsBuilder, TypedFunc};

/// Instantiated module, ready for the relay.
pub struct WasmModule {
    store: Store<HostState>,
    memory: Memory,
    /// Missing until the module exposes its allocator
    alloc_fn: Option<TypedFunc<u32, u32>>,
    entry_fn: TypedFunc<(u32, u32, u32), i32>,
    dealloc_fn: Option<TypedFunc<(u32, u32), ()>>,
    fuel_per_call: Option<u64>,
}

/// WASM runtime for loading blur modules.
pub struct WasmRuntime {
    engine: Engine,
    config: RelayConfig,
}

impl WasmRuntime {
    /// Create a new WASM runtime for the given relay configuration.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let mut engine_config = Config::new();
        engine_config.consume_fuel(config.fuel_per_call.is_some());
        engine_config.wasm_bulk_memory(true);
        engine_config.wasm_threads(false);

        let engine = Engine::new(&engine_config).context("Failed to create WASM engine")?;
        Ok(Self { engine, config })
    }

    /// Read, compile and instantiate a module file.
    pub fn load_file(&self, path: &Path) -> Result<WasmModule> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read WASM module {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());
        self.load_module(&name, &bytes)
    }

    /// Compile and instantiate a module from binary or text (WAT) form.
    ///
    /// The module must export linear memory and the entry point. The
    /// allocator export may be absent, in which case the module never
    /// reports ready.
    pub fn load_module(&self, name: &str, wasm: &[u8]) -> Result<WasmModule> {
        let exports = &self.config.exports;
        let module = Module::new(&self.engine, wasm).context("Failed to compile WASM module")?;

        let mut limits = StoreLimitsBuilder::new();
        if let Some(max) = self.config.max_memory_bytes() {
            limits = limits.memory_size(max);
        }
        let mut store = Store::new(&self.engine, HostState::new(name, limits.build()));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = self.config.fuel_per_call {
            store.set_fuel(fuel)?;
        }

        let mut linker = Linker::new(&self.engine);
        register_host_functions(&mut linker)?;
        // Imports we don't provide trap only if the module actually calls them
        linker.define_unknown_imports_as_traps(&module)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .context("Failed to instantiate WASM module")?;

        let memory = instance
            .get_memory(&mut store, &exports.memory)
            .with_context(|| format!("WASM module must export memory `{}`", exports.memory))?;

        let alloc_fn = instance
            .get_typed_func::<u32, u32>(&mut store, &exports.alloc)
            .ok();
        if alloc_fn.is_none() {
            warn!(
                "Module {} has no `{}(size: u32) -> u32` export; it will never become ready",
                name, exports.alloc
            );
        }

        let entry_fn = instance
            .get_typed_func::<(u32, u32, u32), i32>(&mut store, &exports.entry)
            .with_context(|| {
                format!(
                    "WASM module must export `{}(args: u32, payload: u32, len: u32) -> i32`",
                    exports.entry
                )
            })?;

        let dealloc_fn = match &exports.dealloc {
            Some(dealloc) => {
                let func = instance
                    .get_typed_func::<(u32, u32), ()>(&mut store, dealloc)
                    .ok();
                if func.is_none() {
                    warn!(
                        "Module {} has no `{}(ptr: u32, len: u32)` export; output records will not be released",
                        name, dealloc
                    );
                }
                func
            }
            None => None,
        };

        debug!("Loaded WASM module {}", name);

        Ok(WasmModule {
            store,
            memory,
            alloc_fn,
            entry_fn,
            dealloc_fn,
            fuel_per_call: self.config.fuel_per_call,
        })
    }
}

impl WasmModule {
    /// Reset fuel before a guest call
    fn refuel(&mut self) -> Result<()> {
        if let Some(fuel) = self.fuel_per_call {
            self.store.set_fuel(fuel)?;
        }
        Ok(())
    }

    /// Current size of linear memory in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    fn read_output(&mut self, addr: u32) -> Result<Vec<u8>> {
        let mut prefix = [0u8; OUTPUT_LEN_PREFIX];
        self.memory
            .read(&self.store, addr as usize, &mut prefix)
            .context("Failed to read output length")?;
        let len = decode_output_len(prefix);

        // The length is guest-controlled; check it before allocating for it
        let start = addr as usize + OUTPUT_LEN_PREFIX;
        if start + len as usize > self.memory_size() {
            anyhow::bail!(
                "Output record of {} bytes at {:#x} is out of bounds",
                len,
                addr
            );
        }

        let mut output = vec![0u8; len as usize];
        self.memory
            .read(&self.store, start, &mut output)
            .context("Failed to read output record")?;

        self.refuel()?;
        if let Some(dealloc) = &self.dealloc_fn {
            dealloc
                .call(&mut self.store, (addr, len + OUTPUT_LEN_PREFIX as u32))
                .context("Failed to release output record")?;
        }

        Ok(output)
    }
}

impl GuestModule for WasmModule {
    fn is_ready(&self) -> bool {
        self.alloc_fn.is_some()
    }

    fn alloc(&mut self, size: u32) -> Result<u32> {
        self.refuel()?;
        let alloc = self
            .alloc_fn
            .as_ref()
            .context("Module allocator is not available")?;
        let addr = alloc
            .call(&mut self.store, size)
            .context("Failed to allocate memory")?;
        if addr == 0 && size > 0 {
            anyhow::bail!("Module allocator returned null for {} bytes", size);
        }
        Ok(addr)
    }

    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        self.memory
            .write(&mut self.store, addr as usize, bytes)
            .with_context(|| format!("Failed to write {} bytes at {:#x}", bytes.len(), addr))
    }

    fn invoke(&mut self, args: GuestBuffer, payload: GuestBuffer) -> Result<i32> {
        self.refuel()?;
        self.entry_fn
            .call(&mut self.store, (args.addr(), payload.addr(), payload.len()))
            .context("WASM entry point execution failed")
    }

    fn read_result(&mut self, raw: i32) -> Result<ModuleResult> {
        Ok(match ResultCode::classify(raw) {
            ResultCode::Empty => ModuleResult::Empty,
            ResultCode::Error(code) => ModuleResult::Error(code),
            ResultCode::Output(addr) => ModuleResult::Output(self.read_output(addr)?),
        })
    }
}

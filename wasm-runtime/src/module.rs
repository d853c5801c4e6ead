//! The boundary between the relay and a compiled module.
//!
//! Buffers cross the boundary through [`GuestModule::transfer`], which hands
//! back a [`GuestBuffer`] token. Passing the tokens to
//! [`GuestModule::invoke`] moves them into the module, which from then on
//! owns and releases the memory; the host never frees a transferred buffer.

use anyhow::{Context, Result};
use blurworker_shared::ModuleResult;

/// A region of guest memory written by the host and not yet handed over
#[derive(Debug, PartialEq, Eq)]
pub struct GuestBuffer {
    addr: u32,
    len: u32,
}

impl GuestBuffer {
    pub(crate) fn new(addr: u32, len: u32) -> Self {
        Self { addr, len }
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A loaded module the relay can allocate in, write to and invoke.
pub trait GuestModule: Send {
    /// Whether the module can service allocations yet
    fn is_ready(&self) -> bool;

    /// Allocate `size` bytes with the module's own allocator
    fn alloc(&mut self, size: u32) -> Result<u32>;

    /// Copy `bytes` into guest memory at `addr`
    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<()>;

    /// Call the entry point. Both buffers become the module's to release.
    fn invoke(&mut self, args: GuestBuffer, payload: GuestBuffer) -> Result<i32>;

    /// Turn the entry point's raw return value into a [`ModuleResult`]
    fn read_result(&mut self, raw: i32) -> Result<ModuleResult>;

    /// Allocate a region sized to `bytes` and copy them in.
    fn transfer(&mut self, bytes: &[u8]) -> Result<GuestBuffer> {
        let len = u32::try_from(bytes.len())
            .with_context(|| format!("buffer of {} bytes exceeds guest address space", bytes.len()))?;
        let addr = self.alloc(len)?;
        self.write(addr, bytes)?;
        Ok(GuestBuffer::new(addr, len))
    }
}

//! Shared types and utilities for blurworker
//!
//! This crate contains the messages exchanged with a relay worker, the
//! argument encoding understood by blur modules, and the result ABI shared
//! by the host runtime and the guest SDK.

pub mod types;
pub mod utils;
pub mod wasm;

// Re-export commonly used types
pub use types::{args::*, message::*};
pub use wasm::{ModuleResult, ResultCode};

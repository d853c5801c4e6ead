//! Data types passed between callers, the relay and the module

pub mod args;
pub mod message;

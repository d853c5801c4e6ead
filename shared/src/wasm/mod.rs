//! Result ABI between the host runtime and blur modules
//!
//! A module's entry point returns a single `i32`:
//! - `0` means the module produced no output (e.g. sigma was not positive)
//! - a negative value is a module-defined error code
//! - a positive value is the guest address of an output record laid out as
//!   a little-endian `u32` byte length followed by that many bytes

use serde::{Deserialize, Serialize};

/// Entry point return value for "no output"
pub const RESULT_EMPTY: i32 = 0;

/// Size of the length prefix in front of every output record
pub const OUTPUT_LEN_PREFIX: usize = 4;

/// Error codes used by modules built with the guest SDK.
/// Other modules may return any negative value.
pub mod error_codes {
    /// The argument buffer was not valid UTF-8
    pub const INVALID_ARGS: i32 = -1;
    /// The payload could not be decoded
    pub const DECODE_FAILED: i32 = -2;
    /// The output could not be encoded
    pub const ENCODE_FAILED: i32 = -3;
}

/// Classification of a raw entry point return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Empty,
    Error(i32),
    /// Guest address of an output record
    Output(u32),
}

impl ResultCode {
    pub fn classify(raw: i32) -> Self {
        match raw {
            RESULT_EMPTY => ResultCode::Empty,
            code if code < 0 => ResultCode::Error(code),
            addr => ResultCode::Output(addr as u32),
        }
    }
}

/// What a module returned for one request, as seen by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleResult {
    /// Encoded output file
    Output(Vec<u8>),
    /// The module ran but produced nothing
    Empty,
    /// Module-defined error code, relayed unchanged
    Error(i32),
    /// Positive return value that is not a readable output record
    Unreadable(i32),
}

impl ModuleResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ModuleResult::Error(_))
    }

    pub fn output(&self) -> Option<&[u8]> {
        match self {
            ModuleResult::Output(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_output(self) -> Option<Vec<u8>> {
        match self {
            ModuleResult::Output(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Build an output record: length prefix followed by `data`.
pub fn encode_output(data: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(OUTPUT_LEN_PREFIX + data.len());
    record.extend_from_slice(&(data.len() as u32).to_le_bytes());
    record.extend_from_slice(data);
    record
}

/// Read the byte length stored in an output record's prefix
pub fn decode_output_len(prefix: [u8; OUTPUT_LEN_PREFIX]) -> u32 {
    u32::from_le_bytes(prefix)
}

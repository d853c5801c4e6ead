//! Error reporting example
//!
//! Refuses requests that ask for the alpha channel to be blurred, showing how
//! a module signals failure through its return value.

use blurworker_guest::*;

/// Module-specific error code
const ALPHA_UNSUPPORTED: i32 = -100;

entry_fn!(|args: &str, payload: Vec<u8>| {
    let args = BlurArgs::parse(args);
    if args.apply_to_alpha {
        return Err(ALPHA_UNSUPPORTED);
    }
    if payload.is_empty() {
        return Err(error_codes::DECODE_FAILED);
    }
    Ok(Some(payload))
});

//! Passthrough module example
//!
//! Returns the input file unchanged when a positive sigma is requested and
//! no output otherwise. Useful for measuring relay overhead on its own.

use blurworker_guest::*;

entry_fn!(|args: &str, payload: Vec<u8>| {
    if BlurArgs::parse(args).sigma > 0.0 {
        Ok(Some(payload))
    } else {
        Ok(None)
    }
});

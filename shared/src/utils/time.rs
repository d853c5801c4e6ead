//! Time-related utilities

use std::time::Instant;

/// Milliseconds elapsed since `start`, with sub-millisecond precision
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

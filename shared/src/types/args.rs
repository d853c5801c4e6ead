//! Module argument strings
//!
//! Blur modules receive their options as a single C string of dash-prefixed
//! options: `-s<sigma>` sets the blur radius, `-a` extends the blur to the
//! alpha channel and `-e<ext>` picks the output encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Extension used by modules when none is given
pub const DEFAULT_EXTENSION: &str = "png";

const DELIMITER: char = '-';

#[derive(Debug, Error, PartialEq)]
pub enum ArgsError {
    #[error("sigma must be a finite, non-negative number (got {0})")]
    InvalidSigma(f32),

    #[error("extension {0:?} cannot contain '-', NUL or whitespace")]
    InvalidExtension(String),
}

/// Encode `args` as UTF-8 followed by a single zero byte.
///
/// The result is always `args.len() + 1` bytes long. Interior NUL bytes are
/// copied as-is; a module reading the buffer as a C string stops at the first.
pub fn encode_c_string(args: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(args.len() + 1);
    buf.extend_from_slice(args.as_bytes());
    buf.push(0);
    buf
}

/// Typed form of a blur module's argument string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlurArgs {
    /// Gaussian sigma; modules skip processing when this is not positive
    pub sigma: f32,

    /// Blur the alpha channel as well as the colour channels
    pub apply_to_alpha: bool,

    /// Output image encoding (`png`, `jpg`, ...)
    pub extension: String,
}

impl Default for BlurArgs {
    fn default() -> Self {
        Self {
            sigma: 0.0,
            apply_to_alpha: false,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl BlurArgs {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            ..Default::default()
        }
    }

    /// Parse an argument string the way blur modules read it.
    ///
    /// Parsing never fails: text before the first `-` and unknown options
    /// are ignored, an unreadable sigma becomes `0`.
    pub fn parse(args: &str) -> Self {
        let mut parsed = Self::default();

        let Some((_, options)) = args.split_once(DELIMITER) else {
            return parsed;
        };

        for option in options.split(DELIMITER) {
            let mut chars = option.chars();
            match chars.next() {
                Some('a') => parsed.apply_to_alpha = true,
                Some('s') => parsed.sigma = leading_float(chars.as_str()),
                Some('e') => parsed.extension = chars.as_str().trim_matches(' ').to_string(),
                _ => {}
            }
        }

        parsed
    }

    /// Check that rendering then parsing these arguments is lossless.
    pub fn validate(&self) -> Result<(), ArgsError> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(ArgsError::InvalidSigma(self.sigma));
        }

        let ext = &self.extension;
        if ext.contains(DELIMITER) || ext.contains('\0') || ext.chars().any(char::is_whitespace) {
            return Err(ArgsError::InvalidExtension(ext.clone()));
        }

        Ok(())
    }

    /// Encoded argument buffer for these options
    pub fn to_c_string(&self) -> Vec<u8> {
        encode_c_string(&self.to_string())
    }
}

impl fmt::Display for BlurArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-s{}", self.sigma)?;
        if self.apply_to_alpha {
            write!(f, " -a")?;
        }
        write!(f, " -e{}", self.extension)
    }
}

/// Read the longest numeric prefix of `s` (after leading spaces), 0 if none.
fn leading_float(s: &str) -> f32 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '+')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    s[..end].parse().unwrap_or(0.0)
}

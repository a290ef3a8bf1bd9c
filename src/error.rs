//! Error types.
//!
//! Parse failures are per-signature and never fatal on their own; only a failing
//! line source aborts a load.

use thiserror::Error;

/// Errors produced when parsing a signature line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A required colon, numeric block size, or filename field is missing.
    #[error("invalid signature format: {0}")]
    InvalidFormat(&'static str),
    /// The filename field's closing quote is not the last character of the line.
    #[error("unterminated quote in filename field")]
    UnterminatedQuote,
}

/// Errors that abort loading a known-hash stream.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The underlying line source failed.
    #[error("stream failure after line {line}")]
    StreamFailure {
        /// Number of the last line read successfully (0 if none).
        line: usize,
        /// The I/O error reported by the source.
        #[source]
        source: std::io::Error,
    },
}

/// Errors for loading and validating [`crate::Options`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid TOML for [`crate::Options`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Threshold above the maximum score.
    #[error("threshold {0} is out of range (expected 0..=100)")]
    InvalidThreshold(u8),
}

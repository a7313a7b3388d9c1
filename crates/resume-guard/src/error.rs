//! Error types for `resume-guard`.
//!
//! All fallible operations in the library return [`GuardResult<T>`],
//! which is an alias for `Result<T, GuardError>`.

use std::path::PathBuf;

/// Unified error type for configuration and counter store operations.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// A settings value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Config(String),

    /// Failed to parse a TOML settings file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// A settings file does not exist.
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    /// The counter store could not complete an operation.
    #[error("counter store error: {0}")]
    Store(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `resume-guard`.
pub type GuardResult<T> = Result<T, GuardError>;

//! Error types for Arena core library.

use thiserror::Error;

/// Result type alias using Arena core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Arena plumbing. Config loading wraps the
/// underlying read/parse failures with the offending path.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

use std::io;
use std::time::Duration;

/// Errors that can occur while parsing, building or running fixtures
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed configuration: {0}")]
    MalformedConfig(String),

    #[error("Unresolved placeholder @{name}@ in {directive}")]
    UnresolvedPlaceholder { name: String, directive: String },

    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Execution timed out after {}s", .timeout.as_secs_f64())]
    ExecutionTimeout { timeout: Duration },

    #[error("Build failed with exit code {code:?}: {stderr}")]
    BuildFailed { code: Option<i32>, stderr: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedConfig(message.into())
    }
}

/// Result type alias for easytest operations
pub type Result<T> = std::result::Result<T, Error>;

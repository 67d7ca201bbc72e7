//! Shared error types for the localization pipeline
//!
//! Only conditions that abort a run live here. A test that raises is not an
//! error: it is recorded as a failing [`TestOutcome`](crate::core::TestOutcome)
//! and carried as a [`Fault`](crate::target::Fault) value.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for faultmap operations
#[derive(Debug, Error)]
pub enum Error {
    /// The target could not be loaded: syntax error, unsupported construct,
    /// or a fault raised while executing its module body. Always fatal.
    #[error("failed to load target '{module}': {message}")]
    Load {
        module: String,
        line: Option<usize>,
        message: String,
    },

    /// File system related errors
    #[error("failed to read {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Coverage report errors
    #[error("Coverage error: {0}")]
    Coverage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic errors with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a target load error, optionally pinned to a source line
    pub fn load(module: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match line {
            Some(line) => format!("line {line}: {message}"),
            None => message,
        };
        Self::Load {
            module: module.into(),
            line,
            message,
        }
    }

    /// Create a file system error with path context
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// True for the one error class that aborts a run before any scores
    /// exist: the target itself failed to load.
    pub fn is_harness_error(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::FileSystem { .. })
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: self.to_string(),
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

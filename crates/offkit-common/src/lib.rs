//! # Offkit Common
//!
//! Common error types and logging configuration for the Offkit offline
//! caching engine.
//!
//! ## Features
//!
//! - Unified error type with backtrace support
//! - Logging configuration and setup

use std::time::Duration;
use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for Offkit.
#[derive(Error, Debug)]
pub enum OffkitError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache store errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Install-phase errors (core asset pre-caching).
    #[error("Install error: {message}")]
    Install {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Background sync errors.
    #[error("Sync error: {message}")]
    Sync {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Lifecycle state errors.
    #[error("State error: {0}")]
    State(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Cancelled operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl OffkitError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a cache error with source.
    pub fn cache_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an install error.
    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            source: None,
        }
    }

    /// Create an install error with source.
    pub fn install_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Install {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a sync error.
    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a lifecycle state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    /// Create an internal error with backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OffkitError::Network { .. } | OffkitError::Timeout(_) | OffkitError::Io(_)
        )
    }

    /// Get the error category for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            OffkitError::Network { .. } => "network",
            OffkitError::Cache { .. } => "cache",
            OffkitError::Install { .. } => "install",
            OffkitError::Sync { .. } => "sync",
            OffkitError::Config { .. } => "config",
            OffkitError::State(_) => "state",
            OffkitError::Io(_) => "io",
            OffkitError::Timeout(_) => "timeout",
            OffkitError::Cancelled => "cancelled",
            OffkitError::NotFound(_) => "not_found",
            OffkitError::InvalidArgument(_) => "invalid_argument",
            OffkitError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for Offkit operations.
pub type Result<T> = std::result::Result<T, OffkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(OffkitError::network("test").category(), "network");
        assert_eq!(OffkitError::cache("test").category(), "cache");
        assert_eq!(OffkitError::install("test").category(), "install");
        assert_eq!(
            OffkitError::Timeout(Duration::from_secs(1)).category(),
            "timeout"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(OffkitError::network("test").is_retryable());
        assert!(OffkitError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!OffkitError::cache("test").is_retryable());
        assert!(!OffkitError::Cancelled.is_retryable());
    }

    #[test]
    fn test_source_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let error = OffkitError::cache_with_source("write failed", io);
        assert!(std::error::Error::source(&error).is_some());
    }
}

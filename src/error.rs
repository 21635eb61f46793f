//! Error handling for logroute-rs
//!
//! This module defines the crate-level error type and a Result alias used by
//! the configuration loader, the stage factory and the CLI. Compile and
//! lifecycle errors live in `pipeline::error` and are wrapped here.

use crate::pipeline::error::{CompileError, StartError, StopError};
use crate::pipeline::expr::Content;
use thiserror::Error;

/// Main error type for logroute-rs operations
#[derive(Error, Debug)]
pub enum RouteError {
    /// The route file is semantically invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A driver name has no stage implementation for this content kind
    #[error("Unknown {content} driver '{driver}'")]
    UnknownDriver { content: Content, driver: String },

    /// A driver option is missing or has the wrong type
    #[error("Invalid option '{option}' for driver '{driver}': {message}")]
    InvalidOption {
        driver: String,
        option: String,
        message: String,
    },

    /// The route file is not valid TOML or does not match the schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Stop(#[from] StopError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RouteError>,
    },
}

impl RouteError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RouteError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn invalid_option(
        driver: impl Into<String>,
        option: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RouteError::InvalidOption {
            driver: driver.into(),
            option: option.into(),
            message: message.into(),
        }
    }

    /// The innermost error, with every context frame removed.
    pub fn root(&self) -> &RouteError {
        match self {
            RouteError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for logroute-rs operations
pub type Result<T> = std::result::Result<T, RouteError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<RouteError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::Config("rule has no elements".to_string());
        assert_eq!(err.to_string(), "Configuration error: rule has no elements");
    }

    #[test]
    fn test_error_with_context() {
        let err = RouteError::Config("test".to_string());
        let with_ctx = err.with_context("Failed to load routes.toml");
        assert!(with_ctx.to_string().contains("Failed to load routes.toml"));
        assert!(matches!(with_ctx.root(), RouteError::Config(_)));
    }

    #[test]
    fn test_unknown_driver() {
        let err = RouteError::UnknownDriver {
            content: Content::Destination,
            driver: "kafka".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown destination driver 'kafka'");
    }

    #[test]
    fn test_context_on_foreign_error() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = io.context("Reading route file").unwrap_err();
        assert!(err.to_string().starts_with("Reading route file: IO error"));
        assert!(matches!(err.root(), RouteError::Io(_)));
    }
}

//! Error handling for the clapi gateway.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! Errors fall in two groups. Configuration errors (`Config`,
//! `TransformResolution`) are raised while a service description is loaded and
//! must keep the service from accepting traffic. All other variants are raised
//! while a single request is handled and end up at the dispatch boundary.
//!
//! # Examples
//!
//! ```
//! use clapi::core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     Err(Error::config("No paths defined"))
//! }
//!
//! assert!(might_fail().unwrap_err().is_configuration());
//! ```

use thiserror::Error;

/// Result type for clapi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clapi operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing CLI, response or security configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed transform specification or unresolved/cyclic named reference
    #[error("Transform resolution error: {0}")]
    TransformResolution(String),

    /// A template references symbols that are not bound
    #[error("Unknown parameters: {}", .0.join(", "))]
    UnknownParameter(Vec<String>),

    /// Malformed embedded JSONPath or regex expression
    #[error("Query syntax error in '{expression}': {reason}")]
    QuerySyntax { expression: String, reason: String },

    /// A bound value cannot be used the way a template asks for
    #[error("Parameter value error: {0}")]
    ParameterValue(String),

    /// The executor failed to run the command at all
    #[error("Execution error: {0}")]
    Execution(String),

    /// A security check rejected the request
    #[error("{0}")]
    Auth(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new transform resolution error
    pub fn transform<S: Into<String>>(msg: S) -> Self {
        Self::TransformResolution(msg.into())
    }

    /// Create a new query syntax error for the given placeholder expression
    pub fn query_syntax<E: Into<String>, R: Into<String>>(expression: E, reason: R) -> Self {
        Self::QuerySyntax {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a new parameter value error
    pub fn parameter_value<S: Into<String>>(msg: S) -> Self {
        Self::ParameterValue(msg.into())
    }

    /// Create a new execution error
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a new authentication error carrying the connector's reason text
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::Auth(reason.into())
    }

    /// Whether this error is raised while loading a service description
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::TransformResolution(_))
    }
}

//! Error types and result handling for pgmq-client.
//!
//! This module defines the core error type [`Error`] used throughout the crate, as well as the [`Result`] alias for fallible operations.
//!
//! ## What
//!
//! - [`Error`] enumerates every failure a queue operation can report: malformed JSON, undecodable columns,
//!   broken engine contracts (`MissingIdentifier`, `QueueNotFound`), transport failures and configuration problems.
//! - [`Result<T>`] is a convenient alias for `Result<T, Error>`.
//!
//! ## How
//!
//! Match on [`Error`] to branch on queue existence or to tell an empty result apart from a failed call.
//! Errors are never retried inside the crate.
//!
//! ### Example
//!
//! ```rust
//! use pgmq_client::error::{Error, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::QueueNotFound { name: "jobs".to_string() })
//! }
//! ```
use thiserror::Error;

/// Result type for pgmq-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type for heterogeneous error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for pgmq-client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (SQLx errors)
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Executor could not reach the database
    #[error("Database connection failed: {source}. Context: {context}")]
    ConnectionFailed { source: BoxError, context: String },

    /// Input was not a well-formed JSON document
    #[error("Invalid JSON: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    /// A result column could not be interpreted as the expected type
    #[error("Failed to decode column {}: {message}", display_column(.column))]
    Decode {
        column: Option<usize>,
        message: String,
    },

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A send returned no message id
    #[error("No message id returned after sending to queue '{queue}'")]
    MissingIdentifier { queue: String },

    /// Attempted to access a queue that doesn't exist
    #[error("Queue '{name}' not found")]
    QueueNotFound { name: String },

    /// Required configuration field is missing
    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    /// Configuration field has an invalid value
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },
}

fn display_column(column: &Option<usize>) -> String {
    match column {
        Some(index) => index.to_string(),
        None => "<payload>".to_string(),
    }
}

impl Error {
    /// Decode failure for a payload that is not tied to a result column.
    pub(crate) fn payload(message: impl Into<String>) -> Self {
        Error::Decode {
            column: None,
            message: message.into(),
        }
    }

    /// Decode failure for the column at `index`.
    pub(crate) fn column(index: usize, message: impl Into<String>) -> Self {
        Error::Decode {
            column: Some(index),
            message: message.into(),
        }
    }

    /// True when the failure came from the executor rather than from decoding or from the engine's contract.
    pub fn is_transport(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            Error::Database(_) => true,
            Error::ConnectionFailed { .. } => true,
            _ => false,
        }
    }
}

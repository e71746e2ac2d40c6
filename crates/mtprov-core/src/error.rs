//! Error types for the provisioning core
//!
//! Every fallible operation in the crate returns [`Error`]. Callers that sit
//! on a transport boundary should branch on [`Error::kind`] rather than on
//! individual variants.

use thiserror::Error;

use crate::duration::ParseError;
use crate::model::StaticDnsEntry;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before touching storage
    Validation,
    /// A uniqueness constraint would be violated
    Conflict,
    /// The referenced id or name does not exist
    NotFound,
    /// The storage deadline elapsed
    Timeout,
    /// Any other backend or environment failure
    Storage,
}

/// Core error type for the provisioning system
#[derive(Error, Debug)]
pub enum Error {
    /// A field failed its validation rule
    #[error("validation failed on field '{field}' ({rule}): {value:?}")]
    Validation {
        /// Field name as it appears in the JSON representation
        field: String,
        /// Rule that was violated
        rule: &'static str,
        /// Offending value
        value: String,
    },

    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage deadline exceeded
    #[error("Timed out after {elapsed_ms}ms during {operation}")]
    Timeout {
        /// Storage operation that was running
        operation: &'static str,
        /// Budget that was granted to it
        elapsed_ms: u128,
    },

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration string could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A batch stopped partway through
    #[error("Batch stopped at entry '{failed}' after {} applied: {source}", .applied.len())]
    Batch {
        /// Entries that were written before the failure
        applied: Vec<StaticDnsEntry>,
        /// Name of the entry that failed
        failed: String,
        /// Why it failed
        #[source]
        source: Box<Error>,
    },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, rule: &'static str, value: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            rule,
            value: value.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify the error
    ///
    /// A batch failure takes the kind of the entry error that stopped it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Parse(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Batch { source, .. } => source.kind(),
            Self::Storage(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }

    /// HTTP status a transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Timeout => 504,
            ErrorKind::Storage => 500,
        }
    }

    /// Wrap an entry error with the batch progress made so far
    pub(crate) fn batch(applied: Vec<StaticDnsEntry>, failed: impl Into<String>, source: Error) -> Self {
        Self::Batch {
            applied,
            failed: failed.into(),
            source: Box::new(source),
        }
    }
}

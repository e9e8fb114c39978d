//! Error types for the allocation pipeline
//!
//! Every failure in the engine funnels into [`AllocError`]. Upstream service
//! failures are fatal for the whole run; there are no retries anywhere in the
//! pipeline, so the variants carry enough context for the operator to diagnose
//! the run from the log alone.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AllocError>;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum AllocError {
    /// The identifier authority answered with a non-success status
    #[error("Identifier authority rejected '{operation}' (HTTP {status}): {message}")]
    Authority {
        operation: String,
        status: u16,
        message: String,
    },

    /// The authority returned a different number of identifiers than requested
    #[error("Identifier count mismatch from authority: requested {requested}, received {received}")]
    AllocationCount { requested: usize, received: usize },

    /// An allocation response does not line up with the gene's transcripts
    #[error("Structural mismatch for gene '{gene}': {expected} transcripts in the model, {received} identifiers in the response")]
    StructuralMismatch {
        gene: String,
        expected: usize,
        received: usize,
    },

    /// Two features were registered under the same source identifier
    #[error("Duplicate source id '{0}' in the feature index. The upstream event tables list this feature in more than one event.")]
    DuplicateSourceId(String),

    /// An edited gene has no reference sibling to take its identifier from
    #[error("Edited gene '{0}' has no reference sibling in its locus; cannot reuse an identifier")]
    MissingReference(String),

    /// The assigning application is not registered in the session store
    #[error("Assigning application '{name}' version '{version}' is not registered. Add it to the assigning_application table first.")]
    UnknownApplication { name: String, version: String },

    /// Database operation failed
    #[error("Database error: {0}. Check the database connection settings.")]
    Database(#[from] sqlx::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check the identifier authority URL and credentials.")]
    Http(#[from] reqwest::Error),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file paths and permissions.")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check the config file or environment variables.")]
    Config(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AllocError {
    /// Create an authority error from a failed HTTP exchange
    pub fn authority(
        operation: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Authority {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

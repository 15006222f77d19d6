//! Error types for bal-core

use thiserror::Error;

use crate::api_depot::ApiError;

/// Result type alias using bal-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bal-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A publication precondition does not hold; terminal for the call
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The task queue worker has stopped
    #[error("Task queue is closed")]
    QueueClosed,

    /// Api Depot failure (habilitations and revisions)
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Whether the error is a 404-class failure, locally or from the depot.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Api(ApiError::NotFound(_)))
    }
}

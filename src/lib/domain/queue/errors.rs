//! Error types for the delivery queue

use anyhow::anyhow;
use thiserror::Error;
use tracing::debug;

use crate::domain::mail::errors::ValidationError;

/// A failure of the persistence layer
///
/// Always fatal to the current operation; retry policy belongs to the
/// external scheduler invoking the drain.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A queued message payload could not be encoded or decoded
    #[error("queued message payload could not be encoded or decoded")]
    Payload(#[from] serde_json::Error),

    /// The configured queue table name is not a plain identifier
    #[error("invalid queue table name {0:?}")]
    InvalidTableName(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        debug!("sqlxError: {:?}", err);

        StorageError::UnknownError(anyhow!("Unknown database error: {:?}", err))
    }
}

/// Errors that can occur when queueing a message
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The message is not sendable
    #[error("unable to queue message: {0}")]
    InvalidMessage(#[from] ValidationError),

    /// The persistence layer failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

//! Error types for composing and delivering messages

use thiserror::Error;

/// Reasons a message fails the sendability check
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No message has been created yet
    #[error("no message has been created")]
    NoPendingMessage,

    /// The message has no recipient with a usable address
    #[error("message has no recipient address")]
    MissingRecipient,

    /// The sender address is empty
    #[error("message has no sender address")]
    MissingSenderAddress,

    /// The subject is empty
    #[error("message has no subject")]
    MissingSubject,

    /// The body is empty
    #[error("message has no body")]
    MissingBody,
}

/// Errors raised by a delivery backend
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// An address in the message could not be used by the backend
    #[error("invalid address in message: {0}")]
    InvalidAddress(String),

    /// The backend refused the message
    #[error("delivery was rejected: {0}")]
    Rejected(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that can occur when sending a message immediately
#[derive(Debug, Error)]
pub enum SendError {
    /// The message is not sendable
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The delivery backend failed
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

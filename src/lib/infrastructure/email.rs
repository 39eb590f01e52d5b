//! Delivery adapters implementing the [`crate::domain::mail::Sender`]
//! capability.

use thiserror::Error;

pub mod mailgun;
pub mod smtp;

/// Construction-time configuration failure for a delivery adapter
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdapterConfigError {
    /// A required configuration field is empty
    #[error("unable to create {adapter} adapter: missing {field}")]
    MissingField {
        /// The adapter being configured
        adapter: &'static str,

        /// The field that was left empty
        field: &'static str,
    },
}

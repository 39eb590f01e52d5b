//! Delivery capability

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::mail::{errors::DeliveryError, Message};

/// A delivery backend
///
/// Implementations own every transport detail (SMTP dialogue, HTTP API
/// calls). They must be safe to call repeatedly with different messages
/// from the same process.
#[async_trait]
pub trait Sender: Clone + Send + Sync + 'static {
    /// Deliver a fully-formed message
    ///
    /// # Arguments
    /// * `message` - The [`Message`] to deliver.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] when the backend accepted the message,
    /// or an [`Err`] containing a [`DeliveryError`] on any transport or
    /// protocol problem.
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mock! {
    pub Sender {}

    impl Clone for Sender {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl Sender for Sender {
        async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
    }
}

//! Message draft builder

use std::fmt;

use crate::domain::mail::{
    address::{EmailAddress, Mailbox},
    attachment::Attachment,
    errors::{SendError, ValidationError},
    message::Message,
    sender::Sender,
};

/// An owned draft of one outbound message, bound to a delivery backend
///
/// Each builder holds its own pending message, so several drafts can be
/// composed concurrently without shared state.
pub struct MessageBuilder<S>
where
    S: Sender,
{
    sender: S,
    draft: Option<Message>,
}

impl<S> MessageBuilder<S>
where
    S: Sender,
{
    /// Create a builder with no pending message
    pub fn new(sender: S) -> Self {
        Self {
            sender,
            draft: None,
        }
    }

    /// Replace the pending message
    ///
    /// The message must already be sendable; recipients and attachments can
    /// still be appended afterwards.
    pub fn create(&mut self, message: Message) -> Result<&mut Self, ValidationError> {
        message.validate()?;
        self.draft = Some(message);

        Ok(self)
    }

    /// The current pending message, if any
    pub fn message(&self) -> Option<&Message> {
        self.draft.as_ref()
    }

    /// Append a "To" recipient to the pending message
    pub fn add_address(
        &mut self,
        address: EmailAddress,
        name: Option<&str>,
    ) -> Result<&mut Self, ValidationError> {
        self.draft_mut()?.to.push(mailbox(address, name));

        Ok(self)
    }

    /// Append a "CC" recipient to the pending message
    pub fn add_cc(
        &mut self,
        address: EmailAddress,
        name: Option<&str>,
    ) -> Result<&mut Self, ValidationError> {
        self.draft_mut()?.cc.push(mailbox(address, name));

        Ok(self)
    }

    /// Append a "BCC" recipient to the pending message
    pub fn add_bcc(
        &mut self,
        address: EmailAddress,
        name: Option<&str>,
    ) -> Result<&mut Self, ValidationError> {
        self.draft_mut()?.bcc.push(mailbox(address, name));

        Ok(self)
    }

    /// Append an attachment to the pending message
    pub fn add_attachment(
        &mut self,
        file: impl Into<std::path::PathBuf>,
        name: Option<&str>,
    ) -> Result<&mut Self, ValidationError> {
        let attachment = match name {
            Some(name) => Attachment::named(file, name),
            None => Attachment::new(file),
        };

        self.draft_mut()?.attachments.push(attachment);

        Ok(self)
    }

    /// Discard the pending message
    pub fn discard(&mut self) -> &mut Self {
        self.draft = None;

        self
    }

    /// Remove and return the pending message, validated
    ///
    /// This is the enqueue path: the caller hands the message to the queue
    /// and the builder is left empty.
    pub fn take(&mut self) -> Result<Message, ValidationError> {
        let message = self
            .draft
            .take()
            .ok_or(ValidationError::NoPendingMessage)?;

        message.validate()?;

        Ok(message)
    }

    /// Send the pending message immediately
    ///
    /// The draft is consumed whether or not delivery succeeds, so an
    /// interactive send is attempted at most once. The backend is invoked
    /// exactly once per call.
    pub async fn send(&mut self) -> Result<(), SendError> {
        let message = self
            .draft
            .take()
            .ok_or(ValidationError::NoPendingMessage)?;

        message.validate()?;

        self.sender.send(&message).await?;

        Ok(())
    }

    fn draft_mut(&mut self) -> Result<&mut Message, ValidationError> {
        self.draft
            .as_mut()
            .ok_or(ValidationError::NoPendingMessage)
    }
}

fn mailbox(address: EmailAddress, name: Option<&str>) -> Mailbox {
    match name {
        Some(name) => Mailbox::named(address, name),
        None => Mailbox::new(address),
    }
}

impl<S> fmt::Debug for MessageBuilder<S>
where
    S: Sender,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("draft", &self.draft)
            .field("sender", &"Sender")
            .finish()
    }
}

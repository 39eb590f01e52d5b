//! Outbound message model

use nanohtml2text::html2text;
use serde::{Deserialize, Serialize};

use crate::domain::mail::{
    address::Mailbox, attachment::Attachment, errors::ValidationError,
};

fn default_is_html() -> bool {
    true
}

/// An outbound message
///
/// The payload persisted by the queue; it must round-trip through
/// serialization exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The sender
    pub from: Mailbox,

    /// Reply-to mailbox, when different from the sender
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reply_to: Option<Mailbox>,

    /// "To" recipients; at least one is required before a send
    pub to: Vec<Mailbox>,

    /// "CC" recipients
    pub cc: Vec<Mailbox>,

    /// "BCC" recipients
    pub bcc: Vec<Mailbox>,

    /// Attached files
    pub attachments: Vec<Attachment>,

    /// The subject line
    pub subject: String,

    /// The body, HTML unless [`Message::is_html`] is cleared
    pub body: String,

    /// Whether the body is HTML; a plain-text fallback is derived when set
    #[serde(default = "default_is_html")]
    pub is_html: bool,
}

impl Message {
    /// Create a message with no recipients or attachments yet
    pub fn new(from: Mailbox, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from,
            reply_to: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            attachments: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            is_html: true,
        }
    }

    /// Check the message is sendable
    ///
    /// A message is sendable when the first "To" recipient has a non-empty
    /// address and the sender address, subject and body are all non-empty.
    /// Checked before every send and before every enqueue.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.to.first() {
            None => return Err(ValidationError::MissingRecipient),
            Some(recipient) if recipient.address.as_str().is_empty() => {
                return Err(ValidationError::MissingRecipient)
            }
            Some(_) => {}
        }

        if self.from.address.as_str().is_empty() {
            return Err(ValidationError::MissingSenderAddress);
        }

        if self.subject.is_empty() {
            return Err(ValidationError::MissingSubject);
        }

        if self.body.is_empty() {
            return Err(ValidationError::MissingBody);
        }

        Ok(())
    }

    /// The plain-text rendition of the body
    ///
    /// Derived from the HTML body when [`Message::is_html`] is set, the body
    /// itself otherwise.
    pub fn plain_body(&self) -> String {
        if self.is_html {
            html2text(&self.body)
        } else {
            self.body.clone()
        }
    }
}

//! Outbound mail: the message model, a draft builder and the delivery
//! capability implemented by the adapters in [`crate::infrastructure::email`].

mod address;
mod attachment;
mod builder;
mod message;
mod sender;

pub mod errors;

pub use address::{EmailAddress, EmailAddressError, Mailbox};
pub use attachment::Attachment;
pub use builder::MessageBuilder;
pub use message::Message;
pub use sender::Sender;

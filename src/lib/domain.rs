//! Domain model: outbound messages and the durable delivery queue.

pub mod mail;
pub mod queue;

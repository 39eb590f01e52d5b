#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Transactional outbound-message queue.
//!
//! Callers compose a [`domain::mail::Message`] and either hand it straight
//! to a [`domain::mail::Sender`] or park it in the durable queue for a later
//! drain pass. The queue lives in a single SQL table; delivery backends are
//! pluggable behind the `Sender` capability.

pub mod domain;
pub mod infrastructure;

//! The durable delivery queue: entry model, storage contract and the
//! drain orchestration.

mod entry;
mod repository;
mod service;

pub mod errors;

pub use entry::{EntryId, Priority, QueueEntry};
pub use repository::QueueRepository;
pub use service::{DrainOutcome, QueueService, QueueServiceImpl};

#[cfg(test)]
pub mod tests {
    pub use super::repository::MockQueueRepository;
    pub use super::service::MockQueueService;
}

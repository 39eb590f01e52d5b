//! Queue storage contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::mock;

use crate::domain::{
    mail::Message,
    queue::{
        entry::{EntryId, Priority, QueueEntry},
        errors::StorageError,
    },
};

/// Durable storage for queued entries
///
/// The store exclusively owns entry state; concurrency across processes is
/// delegated to the underlying engine's transactional guarantees, with
/// delete and update as the serialization points.
#[async_trait]
pub trait QueueRepository: Clone + Send + Sync + 'static {
    /// Persist a new entry
    ///
    /// # Arguments
    /// * `message` - The message payload, serialized opaquely by the store.
    /// * `date_due` - When the entry becomes eligible for delivery.
    /// * `priority` - Delivery priority, higher served first.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the assigned [`EntryId`], or
    /// an [`Err`] containing a [`StorageError`] on any persistence failure.
    async fn insert(
        &self,
        message: &Message,
        date_due: DateTime<Utc>,
        priority: Priority,
    ) -> Result<EntryId, StorageError>;

    /// Delete an entry by id
    ///
    /// Returns whether a row existed and was deleted; absence of the row is
    /// not an error, so concurrent removals stay idempotent.
    async fn remove(&self, id: EntryId) -> Result<bool, StorageError>;

    /// Fetch entries whose due time has passed
    ///
    /// Ordered by priority descending, then due time ascending, then id, so
    /// the order is total. A `limit` of zero fetches all due entries. A
    /// payload that fails to deserialize is a [`StorageError`], never
    /// silently skipped.
    async fn due_entries(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError>;

    /// Record a failed delivery attempt
    ///
    /// Sets the attempt timestamp to now and the counter to `attempts`.
    async fn mark_attempt_failed(&self, id: EntryId, attempts: u32) -> Result<(), StorageError>;
}

#[cfg(test)]
mock! {
    pub QueueRepository {}

    impl Clone for QueueRepository {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl QueueRepository for QueueRepository {
        async fn insert(
            &self,
            message: &Message,
            date_due: DateTime<Utc>,
            priority: Priority,
        ) -> Result<EntryId, StorageError>;
        async fn remove(&self, id: EntryId) -> Result<bool, StorageError>;
        async fn due_entries(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError>;
        async fn mark_attempt_failed(&self, id: EntryId, attempts: u32) -> Result<(), StorageError>;
    }
}

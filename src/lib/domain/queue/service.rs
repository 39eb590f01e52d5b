//! Queue service: enqueue and the drain loop

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[cfg(test)]
use mockall::mock;

use crate::domain::{
    mail::{Message, Sender},
    queue::{
        entry::{EntryId, Priority, QueueEntry},
        errors::{EnqueueError, StorageError},
        repository::QueueRepository,
    },
};

/// Aggregate result of one drain pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Entries delivered and removed from the queue
    pub sent: u32,

    /// Entries dropped for reaching the attempt limit
    pub removed: u32,

    /// Entries whose delivery failed and which stay queued for retry
    pub failed: u32,

    /// Ids of the entries that failed, in processing order
    pub failed_ids: Vec<EntryId>,
}

/// The queue operations exposed to callers
#[async_trait]
pub trait QueueService: Clone + Send + Sync + 'static {
    /// Queue a message for deferred delivery
    ///
    /// # Arguments
    /// * `message` - The message to queue; checked for sendability first.
    /// * `date_due` - When the message becomes eligible for delivery.
    /// * `priority` - Delivery priority, higher served first.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the assigned [`EntryId`], or
    /// an [`Err`] containing an [`EnqueueError`] when the message is not
    /// sendable or the store fails.
    async fn enqueue(
        &self,
        message: &Message,
        date_due: DateTime<Utc>,
        priority: Priority,
    ) -> Result<EntryId, EnqueueError>;

    /// Remove an entry from the queue
    ///
    /// Returns whether a row existed and was deleted.
    async fn remove(&self, id: EntryId) -> Result<bool, StorageError>;

    /// Snapshot the entries currently due, without attempting delivery
    async fn list_due(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError>;

    /// Attempt delivery of the entries currently due
    ///
    /// One pass over a snapshot of due entries: delivered entries are
    /// removed, failures are recorded and kept for retry, and entries that
    /// already reached the attempt limit are dropped. A `limit` of zero
    /// drains all due entries.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the [`DrainOutcome`].
    /// Individual delivery failures never fail the call; only a
    /// [`StorageError`] does.
    async fn drain(&self, limit: u32) -> Result<DrainOutcome, StorageError>;
}

#[cfg(test)]
mock! {
    pub QueueService {}

    impl Clone for QueueService {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl QueueService for QueueService {
        async fn enqueue(
            &self,
            message: &Message,
            date_due: DateTime<Utc>,
            priority: Priority,
        ) -> Result<EntryId, EnqueueError>;
        async fn remove(&self, id: EntryId) -> Result<bool, StorageError>;
        async fn list_due(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError>;
        async fn drain(&self, limit: u32) -> Result<DrainOutcome, StorageError>;
    }
}

/// Queue service implementation
///
/// Holds the storage and delivery capabilities by composition; no entry
/// state is cached across calls.
#[derive(Debug, Clone)]
pub struct QueueServiceImpl<R, S>
where
    R: QueueRepository,
    S: Sender,
{
    repo: Arc<R>,
    sender: S,
    max_attempts: u32,
}

impl<R, S> QueueServiceImpl<R, S>
where
    R: QueueRepository,
    S: Sender,
{
    /// Create a new queue service
    pub fn new(repo: Arc<R>, sender: S, max_attempts: u32) -> Self {
        Self {
            repo,
            sender,
            max_attempts,
        }
    }
}

#[async_trait]
impl<R, S> QueueService for QueueServiceImpl<R, S>
where
    R: QueueRepository,
    S: Sender,
{
    async fn enqueue(
        &self,
        message: &Message,
        date_due: DateTime<Utc>,
        priority: Priority,
    ) -> Result<EntryId, EnqueueError> {
        message.validate()?;

        Ok(self.repo.insert(message, date_due, priority).await?)
    }

    async fn remove(&self, id: EntryId) -> Result<bool, StorageError> {
        self.repo.remove(id).await
    }

    async fn list_due(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError> {
        self.repo.due_entries(limit).await
    }

    async fn drain(&self, limit: u32) -> Result<DrainOutcome, StorageError> {
        let entries = self.repo.due_entries(limit).await?;

        let mut outcome = DrainOutcome::default();

        for entry in entries {
            if entry.attempts >= self.max_attempts {
                self.repo.remove(entry.id).await?;
                outcome.removed += 1;

                continue;
            }

            match self.sender.send(&entry.message).await {
                Ok(()) => {
                    // A false result means a concurrent drain already
                    // removed the row; the delivery still happened.
                    self.repo.remove(entry.id).await?;
                    outcome.sent += 1;
                }
                Err(err) => {
                    let attempts = entry.attempts + 1;

                    self.repo.mark_attempt_failed(entry.id, attempts).await?;

                    warn!(
                        id = entry.id,
                        attempts,
                        error = %err,
                        "delivery failed, entry kept for retry"
                    );

                    outcome.failed += 1;
                    outcome.failed_ids.push(entry.id);
                }
            }
        }

        info!(
            sent = outcome.sent,
            removed = outcome.removed,
            failed = outcome.failed,
            "drained message queue"
        );

        Ok(outcome)
    }
}

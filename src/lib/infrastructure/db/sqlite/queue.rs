//! SQLite implementation of the QueueRepository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::Parser;
use sqlx::{FromRow, SqlitePool};

use crate::{
    domain::{
        mail::Message,
        queue::{
            errors::StorageError,
            EntryId, Priority, QueueEntry, QueueRepository,
        },
    },
    infrastructure::db::sqlite::SqliteDatabase,
};

/// Queue storage configuration
#[derive(Clone, Debug, Parser)]
pub struct QueueConfig {
    /// Name of the queue table
    #[clap(long, env = "QUEUE_TABLE", default_value = "mail_queue")]
    pub table: String,

    /// Delivery attempts before an entry is dropped
    #[clap(long, env = "QUEUE_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            table: "mail_queue".to_string(),
            max_attempts: 3,
        }
    }
}

#[derive(FromRow)]
struct EntryRecord {
    id: i64,
    message: String,
    priority: i32,
    date_due: DateTime<Utc>,
    date_attempted: Option<DateTime<Utc>>,
    attempts: u32,
}

impl TryFrom<EntryRecord> for QueueEntry {
    type Error = StorageError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let message: Message = serde_json::from_str(&record.message)?;

        Ok(QueueEntry {
            id: record.id,
            message,
            priority: Priority::new(record.priority),
            date_due: record.date_due,
            date_attempted: record.date_attempted,
            attempts: record.attempts,
        })
    }
}

/// SQLite-backed queue store
///
/// The schema is created idempotently on construction. The table name is
/// interpolated into every statement, so it must be a plain identifier.
#[derive(Clone, Debug)]
pub struct SqliteQueue {
    pool: SqlitePool,
    table: String,
}

impl SqliteQueue {
    /// Create the store, initializing the schema if absent
    pub async fn new(db: &SqliteDatabase, config: &QueueConfig) -> Result<Self, StorageError> {
        let table = config.table.clone();

        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StorageError::InvalidTableName(table));
        }

        let queue = Self {
            pool: db.pool.clone(),
            table,
        };

        queue.create_schema().await?;

        Ok(queue)
    }

    #[mutants::skip]
    async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message TEXT NOT NULL,
                priority INTEGER NOT NULL,
                date_due TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                date_attempted TEXT NULL,
                attempts INTEGER NOT NULL DEFAULT 0
            )",
            self.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QueueRepository for SqliteQueue {
    #[mutants::skip]
    async fn insert(
        &self,
        message: &Message,
        date_due: DateTime<Utc>,
        priority: Priority,
    ) -> Result<EntryId, StorageError> {
        let payload = serde_json::to_string(message)?;

        let result = sqlx::query(&format!(
            "INSERT INTO {} (message, priority, date_due) VALUES (?1, ?2, ?3)",
            self.table
        ))
        .bind(payload)
        .bind(priority.value())
        .bind(date_due)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[mutants::skip]
    async fn remove(&self, id: EntryId) -> Result<bool, StorageError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[mutants::skip]
    async fn due_entries(&self, limit: u32) -> Result<Vec<QueueEntry>, StorageError> {
        let select = format!(
            "SELECT id, message, priority, date_due, date_attempted, attempts
             FROM {}
             WHERE date_due <= ?1
             ORDER BY priority DESC, date_due ASC, id ASC",
            self.table
        );

        let records: Vec<EntryRecord> = if limit == 0 {
            sqlx::query_as(&select)
                .bind(Utc::now())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as(&format!("{select} LIMIT ?2"))
                .bind(Utc::now())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
        };

        records.into_iter().map(QueueEntry::try_from).collect()
    }

    #[mutants::skip]
    async fn mark_attempt_failed(&self, id: EntryId, attempts: u32) -> Result<(), StorageError> {
        sqlx::query(&format!(
            "UPDATE {} SET date_attempted = ?1, attempts = ?2 WHERE id = ?3",
            self.table
        ))
        .bind(Utc::now())
        .bind(attempts)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;
    use testresult::TestResult;

    use crate::domain::{
        mail::{
            errors::DeliveryError, tests::MockSender, Attachment, EmailAddress, Mailbox,
        },
        queue::{DrainOutcome, QueueService, QueueServiceImpl},
    };

    use super::*;

    async fn memory_queue() -> Result<SqliteQueue, StorageError> {
        // A single connection keeps every statement on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        SqliteQueue::new(&SqliteDatabase { pool }, &QueueConfig::default()).await
    }

    fn sendable_message() -> Message {
        let mut message = Message::new(
            Mailbox::new(EmailAddress::new_unchecked("sender@example.com")),
            "Monthly report",
            "<p>The report is attached.</p>",
        );
        message
            .to
            .push(Mailbox::new(EmailAddress::new_unchecked("to@example.com")));
        message
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() -> TestResult {
        let queue = memory_queue().await?;
        let message = sendable_message();

        let first = queue
            .insert(&message, Utc::now(), Priority::default())
            .await?;
        let second = queue
            .insert(&message, Utc::now(), Priority::default())
            .await?;

        assert!(second > first);

        Ok(())
    }

    #[tokio::test]
    async fn test_queued_message_round_trips_exactly() -> TestResult {
        let queue = memory_queue().await?;

        let mut message = sendable_message();
        message.reply_to = Some(Mailbox::named(
            EmailAddress::new_unchecked("replies@example.com"),
            "Replies",
        ));
        message.to.push(Mailbox::named(
            EmailAddress::new_unchecked("second@example.com"),
            "Second",
        ));
        message
            .cc
            .push(Mailbox::new(EmailAddress::new_unchecked("cc@example.com")));
        message
            .bcc
            .push(Mailbox::new(EmailAddress::new_unchecked("bcc@example.com")));
        message.attachments.push(Attachment::new("/tmp/report.pdf"));
        message
            .attachments
            .push(Attachment::named("/tmp/f1.csv", "figures.csv"));
        message.is_html = false;

        let id = queue
            .insert(&message, Utc::now() - Duration::minutes(1), Priority::new(7))
            .await?;

        let entries = queue.due_entries(0).await?;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].message, message);
        assert_eq!(entries[0].priority, Priority::new(7));
        assert_eq!(entries[0].attempts, 0);
        assert_eq!(entries[0].date_attempted, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_due_entries_order_by_priority_then_due_date() -> TestResult {
        let queue = memory_queue().await?;
        let message = sendable_message();
        let now = Utc::now();

        let p3 = queue
            .insert(&message, now - Duration::minutes(40), Priority::new(3))
            .await?;
        let p7_older = queue
            .insert(&message, now - Duration::minutes(30), Priority::new(7))
            .await?;
        let p7_newer = queue
            .insert(&message, now - Duration::minutes(20), Priority::new(7))
            .await?;
        let p1 = queue
            .insert(&message, now - Duration::minutes(10), Priority::new(1))
            .await?;

        let entries = queue.due_entries(0).await?;
        let ids: Vec<EntryId> = entries.iter().map(|entry| entry.id).collect();

        assert_eq!(ids, vec![p7_older, p7_newer, p3, p1]);

        Ok(())
    }

    #[tokio::test]
    async fn test_due_entries_exclude_entries_not_yet_due() -> TestResult {
        let queue = memory_queue().await?;
        let message = sendable_message();

        let due = queue
            .insert(&message, Utc::now() - Duration::minutes(1), Priority::default())
            .await?;
        queue
            .insert(&message, Utc::now() + Duration::hours(1), Priority::default())
            .await?;

        let entries = queue.due_entries(0).await?;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, due);

        Ok(())
    }

    #[tokio::test]
    async fn test_due_entries_honor_the_limit() -> TestResult {
        let queue = memory_queue().await?;
        let message = sendable_message();

        for minutes in 1..=5 {
            queue
                .insert(
                    &message,
                    Utc::now() - Duration::minutes(minutes),
                    Priority::default(),
                )
                .await?;
        }

        assert_eq!(queue.due_entries(2).await?.len(), 2);
        assert_eq!(queue.due_entries(0).await?.len(), 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() -> TestResult {
        let queue = memory_queue().await?;

        let id = queue
            .insert(&sendable_message(), Utc::now(), Priority::default())
            .await?;

        assert!(queue.remove(id).await?);
        assert!(!queue.remove(id).await?);
        assert!(!queue.remove(id + 100).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_attempt_failed_updates_the_entry() -> TestResult {
        let queue = memory_queue().await?;

        let id = queue
            .insert(
                &sendable_message(),
                Utc::now() - Duration::minutes(1),
                Priority::default(),
            )
            .await?;

        queue.mark_attempt_failed(id, 2).await?;

        let entries = queue.due_entries(0).await?;

        assert_eq!(entries[0].attempts, 2);
        assert!(entries[0].date_attempted.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_an_undecodable_payload_is_an_error() -> TestResult {
        let queue = memory_queue().await?;

        sqlx::query("INSERT INTO mail_queue (message, priority, date_due) VALUES (?1, ?2, ?3)")
            .bind("not json")
            .bind(5)
            .bind(Utc::now() - Duration::minutes(1))
            .execute(&queue.pool)
            .await?;

        let result = queue.due_entries(0).await;

        assert!(matches!(result, Err(StorageError::Payload(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_a_table_name_with_punctuation_is_rejected() -> TestResult {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = SqliteDatabase { pool };

        let config = QueueConfig {
            table: "mail_queue; DROP TABLE users".to_string(),
            max_attempts: 3,
        };

        let result = SqliteQueue::new(&db, &config).await;

        assert!(matches!(result, Err(StorageError::InvalidTableName(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() -> TestResult {
        let queue = memory_queue().await?;

        SqliteQueue::new(
            &SqliteDatabase {
                pool: queue.pool.clone(),
            },
            &QueueConfig::default(),
        )
        .await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_drain_serves_the_highest_priority_first_then_fifo() -> TestResult {
        let queue = memory_queue().await?;
        let message = sendable_message();
        let now = Utc::now();

        let older_p5 = queue
            .insert(&message, now - Duration::minutes(10), Priority::new(5))
            .await?;
        let newer_p5 = queue
            .insert(&message, now - Duration::minutes(5), Priority::new(5))
            .await?;
        let p10 = queue
            .insert(&message, now - Duration::minutes(1), Priority::new(10))
            .await?;

        let mut sender = MockSender::new();
        sender.expect_send().times(2).returning(|_| Ok(()));

        let config = QueueConfig::default();
        let service = QueueServiceImpl::new(Arc::new(queue.clone()), sender, config.max_attempts);

        let outcome = service.drain(2).await?;

        assert_eq!(
            outcome,
            DrainOutcome {
                sent: 2,
                removed: 0,
                failed: 0,
                failed_ids: vec![],
            }
        );

        // The priority-10 entry and the older of the two priority-5
        // entries are gone; the newer one is still queued.
        let remaining = queue.due_entries(0).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, newer_p5);
        assert!(!queue.remove(p10).await?);
        assert!(!queue.remove(older_p5).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_entries_retry_until_the_attempt_limit() -> TestResult {
        let queue = memory_queue().await?;

        let id = queue
            .insert(
                &sendable_message(),
                Utc::now() - Duration::minutes(1),
                Priority::default(),
            )
            .await?;

        let mut sender = MockSender::new();
        sender
            .expect_send()
            .times(3)
            .returning(|_| Err(DeliveryError::Rejected("greylisted".to_string())));

        let config = QueueConfig::default();
        let service = QueueServiceImpl::new(Arc::new(queue.clone()), sender, config.max_attempts);

        for attempt in 1..=3u32 {
            let outcome = service.drain(0).await?;

            assert_eq!(outcome.failed, 1);
            assert_eq!(outcome.failed_ids, vec![id]);

            let entries = queue.due_entries(0).await?;
            assert_eq!(entries[0].attempts, attempt);
        }

        // The attempt limit is reached: the next pass drops the entry
        // without calling the backend again.
        let outcome = service.drain(0).await?;

        assert_eq!(
            outcome,
            DrainOutcome {
                sent: 0,
                removed: 1,
                failed: 0,
                failed_ids: vec![],
            }
        );
        assert!(queue.due_entries(0).await?.is_empty());

        Ok(())
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{MutationId, MutationRecord, SyncStatus};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Record not found")]
    NotFound,
    #[error("Record '{0}' is already queued")]
    Duplicate(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Partial update merged into an existing record.
///
/// Only the supplied fields change; everything else keeps its stored value.
#[derive(Debug, Clone, Default)]
pub struct OutboxUpdate {
    pub status: Option<SyncStatus>,
    pub retry_count: Option<u32>,
    pub timestamp: Option<i64>,
}

impl OutboxUpdate {
    #[must_use]
    pub fn status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Merge into a record in place.
    pub fn apply_to(&self, record: &mut MutationRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(retry_count) = self.retry_count {
            record.retry_count = retry_count;
        }
        if let Some(timestamp) = self.timestamp {
            record.timestamp = timestamp;
        }
    }
}

/// Durable outbox collection, keyed by record id.
///
/// Guarantees per-call atomicity of a single record's write and nothing more:
/// the engine's single-flight session prevents a second in-process drain, and
/// concurrent external writers to the *same* record are an accepted race.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a new record. Fails on a duplicate id or a backend error; a
    /// failed enqueue means the write was NOT safely queued and the caller
    /// must surface that.
    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StorageError>;

    /// The single earliest-eligible record: `status = pending` and
    /// `timestamp <= now`, ordered by `(timestamp, id)` ascending. Approximate
    /// FIFO — a record deferred by backoff can be overtaken by a newer one.
    async fn get_next_pending(&self) -> Result<Option<MutationRecord>, StorageError>;

    /// Merge fields into an existing record.
    async fn update(&self, id: &MutationId, update: OutboxUpdate) -> Result<(), StorageError>;

    /// Full contents, for the smart-sync gate and operator tooling.
    async fn scan_all(&self) -> Result<Vec<MutationRecord>, StorageError>;

    /// Number of records still pending (eligible or deferred).
    async fn count_pending(&self) -> Result<u64, StorageError> {
        let records = self.scan_all().await?;
        Ok(records
            .iter()
            .filter(|r| r.status == SyncStatus::Pending)
            .count() as u64)
    }
}

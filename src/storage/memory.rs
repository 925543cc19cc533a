use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{OutboxStore, OutboxUpdate, StorageError};
use crate::record::{now_ms, MutationId, MutationRecord};

/// Non-durable outbox for tests and ephemeral embedders.
pub struct InMemoryOutbox {
    records: DashMap<MutationId, MutationRecord>,
}

impl InMemoryOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fetch one record by id (inspection helper, not part of the store contract)
    #[must_use]
    pub fn get(&self, id: &MutationId) -> Option<MutationRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn enqueue(&self, record: &MutationRecord) -> Result<(), StorageError> {
        if self.records.contains_key(&record.id) {
            return Err(StorageError::Duplicate(record.id.to_string()));
        }
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_next_pending(&self) -> Result<Option<MutationRecord>, StorageError> {
        let now = now_ms();
        let next = self
            .records
            .iter()
            .filter(|r| r.value().is_eligible_at(now))
            .map(|r| r.value().clone())
            .min_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.id.as_str().cmp(b.id.as_str()))
            });
        Ok(next)
    }

    async fn update(&self, id: &MutationId, update: OutboxUpdate) -> Result<(), StorageError> {
        let mut entry = self.records.get_mut(id).ok_or(StorageError::NotFound)?;
        update.apply_to(entry.value_mut());
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<MutationRecord>, StorageError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}

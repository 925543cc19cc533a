// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live mutation handles and the collaborator seams around them.
//!
//! A [`MutationHandle`] is the in-memory representation of one logical write:
//! its identifier, logical key, input payload, and the idempotency key derived
//! from them. The drain loop prefers the handle already registered for a record
//! (same session); when none exists it builds a *replay* handle from the
//! durable record, which re-derives the identical idempotency key so the
//! server can de-duplicate across sessions.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::idempotency::IdempotencyKey;
use crate::record::{MutationId, MutationKey, MutationRecord};

/// Failure reported by the mutation executor for one attempt.
///
/// The drain loop treats every variant as a failed attempt: the record is
/// deferred with backoff and eventually marked terminally failed.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("transient network failure: {0}")]
    Transient(String),
    #[error("server rejected request: {0}")]
    Rejected(String),
}

/// One live, executable mutation.
#[derive(Debug, Clone)]
pub struct MutationHandle {
    pub id: MutationId,
    pub mutation_key: MutationKey,
    pub variables: Vec<u8>,
    /// Computed once per logical write; identical across retries and replays
    pub idempotency_key: IdempotencyKey,
}

impl MutationHandle {
    /// Build a fresh handle for a newly dispatched write.
    #[must_use]
    pub fn new(id: MutationId, mutation_key: MutationKey, variables: Vec<u8>) -> Self {
        let idempotency_key = IdempotencyKey::derive(&mutation_key, &variables);
        Self {
            id,
            mutation_key,
            variables,
            idempotency_key,
        }
    }

    /// Reconstruct a handle from a durable record (a replay).
    ///
    /// This is how a mutation issued in a prior session gets re-executed after
    /// a restart: same key, same payload, and therefore the same idempotency
    /// key as the original dispatch.
    #[must_use]
    pub fn replay(record: &MutationRecord) -> Self {
        Self::new(
            record.id.clone(),
            record.mutation_key.clone(),
            record.variables.clone(),
        )
    }
}

/// Performs the network operation for a mutation.
///
/// The engine controls *when* and *how often* this is invoked, never its
/// internals. Implementations send `idempotency_key` with the request so the
/// server can discard duplicates.
#[async_trait]
pub trait MutationExecutor: Send + Sync {
    async fn execute(&self, handle: &MutationHandle) -> Result<(), ExecuteError>;
}

/// Locates in-flight/paused mutation handles and resumes paused work in bulk.
#[async_trait]
pub trait MutationCache: Send + Sync {
    /// Find the live handle matching a record's identifier, if one exists in
    /// this session.
    fn find(&self, id: &MutationId) -> Option<MutationHandle>;

    /// Resume every currently paused handle. Returns how many were resumed.
    async fn resume_paused(&self) -> usize;
}

/// Typed in-memory handle registry.
///
/// Handles are keyed by [`MutationId`]; paused handles (writes parked while
/// offline) are tracked separately until `resume_paused` moves them back.
pub struct HandleRegistry {
    active: DashMap<MutationId, MutationHandle>,
    paused: DashMap<MutationId, MutationHandle>,
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            paused: DashMap::new(),
        }
    }

    /// Register a live handle.
    pub fn insert(&self, handle: MutationHandle) {
        self.active.insert(handle.id.clone(), handle);
    }

    /// Park a handle as paused (e.g. dispatched while offline).
    pub fn pause(&self, handle: MutationHandle) {
        self.paused.insert(handle.id.clone(), handle);
    }

    /// Drop a handle once its record reaches a terminal status.
    pub fn remove(&self, id: &MutationId) {
        self.active.remove(id);
        self.paused.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len() + self.paused.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.paused.is_empty()
    }

    #[must_use]
    pub fn paused_count(&self) -> usize {
        self.paused.len()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MutationCache for HandleRegistry {
    fn find(&self, id: &MutationId) -> Option<MutationHandle> {
        self.active
            .get(id)
            .or_else(|| self.paused.get(id))
            .map(|r| r.value().clone())
    }

    async fn resume_paused(&self) -> usize {
        let ids: Vec<MutationId> = self.paused.iter().map(|r| r.key().clone()).collect();
        let mut resumed = 0;
        for id in ids {
            if let Some((id, handle)) = self.paused.remove(&id) {
                self.active.insert(id, handle);
                resumed += 1;
            }
        }
        resumed
    }
}

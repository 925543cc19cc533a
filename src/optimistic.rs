// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optimistic cache updates and rollback.
//!
//! Every mutation type follows the same discipline:
//!
//! 1. **Before dispatch** — snapshot the affected views, splice a placeholder
//!    result in so the UI updates immediately, derive the idempotency key.
//! 2. **On error** — restore the snapshot verbatim. A failed restore is logged
//!    and swallowed: it degrades UI freshness, never correctness, because of
//!    step 3.
//! 3. **On settle** — success or failure, always invalidate the affected views
//!    so server truth supersedes whatever the placeholder showed.
//!
//! Per-attempt state machine: `Idle → Optimistic → {Committed | RolledBack}`,
//! both terminal states funneling through the mandatory reconciliation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::handles::MutationHandle;
use crate::idempotency::IdempotencyKey;
use crate::record::{MutationId, MutationKey};

/// Namespace for placeholder identifiers. Server-assigned ids never carry this
/// prefix, so a placeholder is always distinguishable from a real entity.
pub const PLACEHOLDER_PREFIX: &str = "optimistic:";

static PLACEHOLDER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Reserve a sentinel identifier for a not-yet-confirmed entity.
#[must_use]
pub fn placeholder_id() -> String {
    format!(
        "{}{}",
        PLACEHOLDER_PREFIX,
        PLACEHOLDER_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Whether an identifier names a placeholder rather than a server entity.
#[must_use]
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("Snapshot no longer applies: {0}")]
    Stale(String),
    #[error("Cache rejected restore: {0}")]
    Cache(String),
}

/// Captured prior state of the views a mutation touches, restored verbatim on
/// rollback.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// The view scope this snapshot covers
    pub scope: MutationKey,
    /// Opaque view payloads as they were before the optimistic splice
    pub views: Vec<(String, Value)>,
}

/// UI-facing cache collaborator.
///
/// The engine only orchestrates *when* views change; their shape and storage
/// belong to the embedder.
#[async_trait]
pub trait ViewCache: Send + Sync {
    /// Capture the current state of the views under `scope`.
    fn snapshot(&self, scope: &MutationKey) -> CacheSnapshot;

    /// Splice a speculative result into the views under `scope`.
    fn splice(&self, scope: &MutationKey, placeholder: Value);

    /// Restore a previously captured snapshot verbatim.
    fn restore(&self, snapshot: CacheSnapshot) -> Result<(), RollbackError>;

    /// Invalidate/refetch authoritative server state for the views under
    /// `scope`.
    async fn invalidate(&self, scope: &MutationKey);
}

/// Per-attempt lifecycle of an optimistic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    /// Placeholder visible, snapshot captured
    Optimistic,
    /// Server confirmed; placeholder awaiting reconciliation
    Committed,
    /// Snapshot restored (or restore failed and was logged)
    RolledBack,
}

/// One in-flight optimistic mutation: the handle to execute plus what is
/// needed to undo its speculative effects.
pub struct OptimisticMutation {
    pub handle: MutationHandle,
    pub placeholder_id: String,
    snapshot: Option<CacheSnapshot>,
    state: AttemptState,
}

impl OptimisticMutation {
    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }
}

/// Applies the uniform optimistic pattern against an injected [`ViewCache`].
pub struct OptimisticApplier {
    cache: Arc<dyn ViewCache>,
}

impl OptimisticApplier {
    pub fn new(cache: Arc<dyn ViewCache>) -> Self {
        Self { cache }
    }

    /// Before dispatch: snapshot, splice a placeholder, derive the
    /// idempotency key (once per logical attempt — replays reuse it).
    pub fn on_mutate(
        &self,
        id: MutationId,
        mutation_key: MutationKey,
        variables: Vec<u8>,
        placeholder_body: Value,
    ) -> OptimisticMutation {
        let snapshot = self.cache.snapshot(&mutation_key);

        let pid = placeholder_id();
        let mut body = placeholder_body;
        if let Value::Object(ref mut map) = body {
            map.insert("id".into(), Value::String(pid.clone()));
        }
        self.cache.splice(&mutation_key, body);

        let handle = MutationHandle::new(id, mutation_key, variables);
        debug!(
            id = %handle.id,
            key = %handle.mutation_key,
            placeholder = %pid,
            idempotency_key = %handle.idempotency_key,
            "Optimistic update applied"
        );

        OptimisticMutation {
            handle,
            placeholder_id: pid,
            snapshot: Some(snapshot),
            state: AttemptState::Optimistic,
        }
    }

    /// On success: the speculative state stands until reconciliation.
    pub fn on_success(&self, mutation: &mut OptimisticMutation) {
        mutation.snapshot = None;
        mutation.state = AttemptState::Committed;
    }

    /// On error: restore the captured snapshot, discarding the placeholder.
    /// A restore failure is logged and swallowed — the settle-time refetch
    /// reconciles truth regardless.
    pub fn on_error(&self, mutation: &mut OptimisticMutation) {
        if let Some(snapshot) = mutation.snapshot.take() {
            if let Err(e) = self.cache.restore(snapshot) {
                warn!(
                    id = %mutation.handle.id,
                    error = %e,
                    "Rollback failed, waiting on settle-time refetch"
                );
            }
        }
        mutation.state = AttemptState::RolledBack;
    }

    /// On settle (always, success or failure): invalidate the affected views
    /// so the placeholder is superseded by the real record.
    pub async fn on_settled(&self, mutation: &mut OptimisticMutation) {
        self.cache.invalidate(&mutation.handle.mutation_key).await;
        mutation.state = AttemptState::Idle;
    }

    /// The key computed for this attempt (deterministic across replays).
    #[must_use]
    pub fn idempotency_key(mutation: &OptimisticMutation) -> &IdempotencyKey {
        &mutation.handle.idempotency_key
    }
}

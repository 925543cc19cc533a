// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync coordinator.
//!
//! The [`SyncCoordinator`] drives the outbox to empty: it parks writes that
//! cannot reach the server, and drains eligible records one at a time against
//! the mutation executor, never running two drains concurrently.
//!
//! # Single flight
//!
//! Mutual exclusion for the drain loop is one session slot holding the shared
//! future of the drain currently running. A caller that observes a populated
//! slot awaits that session instead of starting a second drain, so the same
//! record is never executed twice concurrently. The slot is the only lock in
//! the system and is never held across an await.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use outbox_engine::{
//!     HandleRegistry, InMemoryOutbox, MutationHandle, MutationId, MutationKey,
//!     OutboxConfig, SyncCoordinator,
//! };
//! # use outbox_engine::{ExecuteError, MutationExecutor};
//! # struct Api;
//! # #[async_trait::async_trait]
//! # impl MutationExecutor for Api {
//! #     async fn execute(&self, _: &MutationHandle) -> Result<(), ExecuteError> { Ok(()) }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let coordinator = Arc::new(SyncCoordinator::new(
//!     Arc::new(InMemoryOutbox::new()),
//!     Arc::new(Api),
//!     Arc::new(HandleRegistry::new()),
//!     &OutboxConfig::default(),
//! ));
//!
//! let handle = MutationHandle::new(
//!     MutationId::from("m-1"),
//!     MutationKey::new(["create-prop"]),
//!     br#"{"name":"Acme"}"#.to_vec(),
//! );
//! coordinator.park(&handle).await.expect("write was not safely queued");
//!
//! let summary = coordinator.start_sync().await;
//! println!("{}", summary);
//! # }
//! ```

mod drain;
mod gate;
mod types;

pub use types::{DrainSummary, SmartSyncOutcome};

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::backoff::RetryPolicy;
use crate::config::OutboxConfig;
use crate::handles::{MutationCache, MutationExecutor, MutationHandle};
use crate::record::MutationRecord;
use crate::storage::{OutboxStore, StorageError};

type SyncSession = Shared<BoxFuture<'static, DrainSummary>>;

/// Drives the outbox against the network, one record at a time.
///
/// Constructed once with its collaborators injected, then shared by reference
/// with every call site (UI dispatch path, reconnect watcher, tests).
pub struct SyncCoordinator {
    pub(super) outbox: Arc<dyn OutboxStore>,
    pub(super) executor: Arc<dyn MutationExecutor>,
    pub(super) mutations: Arc<dyn MutationCache>,
    pub(super) policy: RetryPolicy,

    /// The one live sync session, if a drain is currently running
    session: Mutex<Option<SyncSession>>,
}

impl SyncCoordinator {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        executor: Arc<dyn MutationExecutor>,
        mutations: Arc<dyn MutationCache>,
        config: &OutboxConfig,
    ) -> Self {
        Self {
            outbox,
            executor,
            mutations,
            policy: config.retry_policy(),
            session: Mutex::new(None),
        }
    }

    /// Park a write for later synchronization.
    ///
    /// Builds a pending record from the live handle and appends it to the
    /// outbox. A storage failure propagates to the caller: the write was NOT
    /// safely queued and must not be treated as such.
    pub async fn park(&self, handle: &MutationHandle) -> Result<MutationRecord, StorageError> {
        let record = MutationRecord::new(
            handle.id.clone(),
            handle.mutation_key.clone(),
            handle.variables.clone(),
        );
        self.outbox.enqueue(&record).await?;

        debug!(id = %record.id, key = %record.mutation_key, "Mutation parked in outbox");
        if let Ok(pending) = self.outbox.count_pending().await {
            crate::metrics::set_outbox_pending(pending);
        }
        Ok(record)
    }

    /// Start a drain, or join the one already running.
    ///
    /// Every caller awaiting during the same session receives the same
    /// [`DrainSummary`]; the executor is invoked exactly once per record no
    /// matter how many callers joined.
    pub async fn start_sync(self: &Arc<Self>) -> DrainSummary {
        let session = {
            let mut slot = self.session.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Sync already in flight, joining existing session");
                    existing.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let fut = async move {
                        let summary = this.drain().await;
                        this.session.lock().take();
                        summary
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        session.await
    }

    /// Whether a drain session is currently in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.session.lock().is_some()
    }
}

//! # Outbox Engine
//!
//! A durable offline mutation queue and synchronization engine: the client
//! keeps working while disconnected, writes queue locally, and the engine
//! reconciles them once connectivity returns while the UI shows optimistic
//! results immediately.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Optimistic Applier                      │
//! │  • Placeholder spliced into cached views before dispatch    │
//! │  • Snapshot captured for rollback, refetch on settle        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (offline or network failure)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Outbox Store                           │
//! │  • Durable SQLite table, survives restarts                  │
//! │  • pending → syncing → {synced | failed}                    │
//! │  • Not-before timestamp gates backoff-deferred records      │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!          ┌───────────────────┴───────────────────┐
//! ┌────────┴────────────────┐     ┌────────────────┴────────────┐
//! │   Reconnect Watcher     │     │       Sync Coordinator      │
//! │  • online/offline watch │ ──▶ │  • Single-flight drain loop │
//! │  • 2000 ms debounce     │     │  • 3 attempts, 2^n backoff  │
//! │  • Smart-sync gate      │     │  • Replays across sessions  │
//! └─────────────────────────┘     └─────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use outbox_engine::{
//!     HandleRegistry, MutationHandle, MutationId, MutationKey, OutboxConfig,
//!     ReconnectWatcher, SqliteOutbox, SyncCoordinator,
//! };
//! # use outbox_engine::{ExecuteError, MutationExecutor};
//! # struct RestTransport;
//! # #[async_trait::async_trait]
//! # impl MutationExecutor for RestTransport {
//! #     async fn execute(&self, _: &MutationHandle) -> Result<(), ExecuteError> { Ok(()) }
//! # }
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OutboxConfig {
//!         db_path: Some("./outbox.db".into()),
//!         ..Default::default()
//!     };
//!
//!     let outbox = Arc::new(
//!         SqliteOutbox::open(config.db_path.as_deref().unwrap())
//!             .await
//!             .expect("Failed to open outbox"),
//!     );
//!     let coordinator = Arc::new(SyncCoordinator::new(
//!         outbox,
//!         Arc::new(RestTransport),
//!         Arc::new(HandleRegistry::new()),
//!         &config,
//!     ));
//!
//!     // Wire the platform's connectivity signal in
//!     let (_online_tx, online_rx) = watch::channel(true);
//!     let watcher =
//!         ReconnectWatcher::spawn(coordinator.clone(), online_rx, config.debounce());
//!
//!     // A write dispatched while offline gets parked for later replay
//!     let handle = MutationHandle::new(
//!         MutationId::from("m-1"),
//!         MutationKey::new(["create-prop"]),
//!         br#"{"name":"Acme"}"#.to_vec(),
//!     );
//!     coordinator.park(&handle).await.expect("write was not safely queued");
//!
//!     // ...later, or via the watcher on reconnect:
//!     let summary = coordinator.start_sync().await;
//!     println!("{}", summary);
//!
//!     watcher.shutdown().await;
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Durability**: a parked write survives process restarts; enqueue failures
//!   propagate so a caller never mistakes an unqueued write for a queued one
//! - **Single flight**: at most one drain runs process-wide; concurrent
//!   `start_sync` callers join the same session
//! - **At-least-once**: replays carry a deterministic idempotency key so the
//!   server can discard duplicates; exactly-once is explicitly not claimed
//! - **Bounded retry**: 3 attempts with 2^n-second backoff, then the record is
//!   terminally `failed` and left visible for operator tooling
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`SyncCoordinator`] drain loop and smart-sync gate
//! - [`storage`]: outbox backends (SQLite, memory)
//! - [`reconnect`]: debounced online/offline watcher
//! - [`optimistic`]: placeholder/rollback discipline for cached views
//! - [`idempotency`]: deterministic deduplication keys
//! - [`backoff`]: retry policy

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod handles;
pub mod idempotency;
pub mod metrics;
pub mod optimistic;
pub mod reconnect;
pub mod record;
pub mod storage;

pub use backoff::RetryPolicy;
pub use config::OutboxConfig;
pub use coordinator::{DrainSummary, SmartSyncOutcome, SyncCoordinator};
pub use handles::{
    ExecuteError, HandleRegistry, MutationCache, MutationExecutor, MutationHandle,
};
pub use idempotency::IdempotencyKey;
pub use optimistic::{
    is_placeholder, placeholder_id, AttemptState, CacheSnapshot, OptimisticApplier,
    OptimisticMutation, RollbackError, ViewCache, PLACEHOLDER_PREFIX,
};
pub use reconnect::ReconnectWatcher;
pub use record::{MutationId, MutationKey, MutationRecord, SyncStatus};
pub use storage::{InMemoryOutbox, OutboxStore, OutboxUpdate, SqliteOutbox, StorageError};

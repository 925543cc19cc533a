// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The drain loop: replay queued mutations until none remain eligible.

use tracing::{debug, error, info, warn};

use super::{DrainSummary, SyncCoordinator};
use crate::handles::MutationHandle;
use crate::record::{now_ms, SyncStatus};
use crate::storage::OutboxUpdate;

impl SyncCoordinator {
    /// Process eligible outbox records one at a time.
    ///
    /// Iterative by design: the loop ends when `get_next_pending` returns
    /// nothing, which happens naturally once only backoff-deferred records
    /// remain. A single record's failure never aborts the loop; a storage
    /// failure does (logged), and a later session resumes where this one
    /// stopped.
    pub(super) async fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();

        loop {
            let record = match self.outbox.get_next_pending().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Outbox scan failed, stopping drain");
                    break;
                }
            };

            // Prefer the live handle from this session; otherwise replay from
            // the durable record (same payload, same idempotency key).
            let handle = self
                .mutations
                .find(&record.id)
                .unwrap_or_else(|| MutationHandle::replay(&record));

            debug!(
                id = %record.id,
                key = %record.mutation_key,
                attempt = record.retry_count + 1,
                "Executing queued mutation"
            );

            let update = match self.executor.execute(&handle).await {
                Ok(()) => {
                    summary.synced += 1;
                    crate::metrics::record_attempt("synced");
                    debug!(id = %record.id, "Mutation synced");
                    OutboxUpdate::default()
                        .status(SyncStatus::Synced)
                        .timestamp(now_ms())
                }
                Err(e) => {
                    let retry_count = record.retry_count + 1;
                    if self.policy.is_exhausted(retry_count) {
                        summary.failed += 1;
                        crate::metrics::record_attempt("failed");
                        warn!(
                            id = %record.id,
                            retry_count,
                            error = %e,
                            "Retry budget exhausted, marking record failed"
                        );
                        OutboxUpdate::default()
                            .status(SyncStatus::Failed)
                            .retry_count(retry_count)
                    } else {
                        let delay_ms = self.policy.backoff_ms(retry_count);
                        summary.deferred += 1;
                        crate::metrics::record_attempt("deferred");
                        debug!(
                            id = %record.id,
                            retry_count,
                            delay_ms,
                            error = %e,
                            "Attempt failed, deferring with backoff"
                        );
                        OutboxUpdate::default()
                            .retry_count(retry_count)
                            .timestamp(now_ms() + delay_ms)
                    }
                }
            };

            if let Err(e) = self.outbox.update(&record.id, update).await {
                // Without the status write this record would be re-selected
                // immediately; stop and let a later session retry.
                error!(id = %record.id, error = %e, "Outbox update failed, stopping drain");
                break;
            }
        }

        if !summary.is_idle() {
            info!(
                synced = summary.synced,
                deferred = summary.deferred,
                failed = summary.failed,
                "Outbox drain complete"
            );
        }
        crate::metrics::record_drain(&summary);
        if let Ok(pending) = self.outbox.count_pending().await {
            crate::metrics::set_outbox_pending(pending);
        }

        summary
    }
}

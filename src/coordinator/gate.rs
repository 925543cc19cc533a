//! Smart-sync gate: resume paused work only when the outbox says it exists.
//!
//! The bulk-resume capability of the mutation cache is broad (it wakes every
//! paused handle), so a reconnect should not invoke it blindly. The gate
//! inspects the outbox first and only resumes when at least one pending,
//! resumable record is queued.

use tracing::{debug, info};

use super::{SmartSyncOutcome, SyncCoordinator};
use crate::record::SyncStatus;

impl SyncCoordinator {
    /// Decide whether a broad "resume all paused work" is warranted.
    ///
    /// Selects records that are `pending` and still carry a resumable shape;
    /// an empty selection is a no-op. Otherwise the mutation cache's bulk
    /// resume is invoked exactly once.
    pub async fn smart_sync(&self) -> SmartSyncOutcome {
        let records = match self.outbox.scan_all().await {
            Ok(records) => records,
            Err(e) => {
                debug!(error = %e, "Outbox scan failed, skipping resume");
                return SmartSyncOutcome::idle();
            }
        };

        let pending_count = records
            .iter()
            .filter(|r| r.status == SyncStatus::Pending && r.is_resumable())
            .count();

        if pending_count == 0 {
            debug!("No pending mutations, skipping resume");
            return SmartSyncOutcome::idle();
        }

        let resumed = self.mutations.resume_paused().await;
        info!(pending_count, resumed, "Paused mutations resumed");

        SmartSyncOutcome {
            resumed: true,
            pending_count,
        }
    }
}

//! Public types for the sync coordinator.

/// Outcome of one drain pass over the outbox.
///
/// Returned by [`super::SyncCoordinator::start_sync()`]; when several callers
/// join the same in-flight session they all receive the same summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSummary {
    /// Records that reached `synced`
    pub synced: usize,
    /// Records deferred with backoff, still `pending`
    pub deferred: usize,
    /// Records that exhausted their retry budget and became `failed`
    pub failed: usize,
}

impl DrainSummary {
    /// Total records this pass attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.synced + self.deferred + self.failed
    }

    /// True when nothing was eligible.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.attempted() == 0
    }
}

impl std::fmt::Display for DrainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Drain(synced={}, deferred={}, failed={})",
            self.synced, self.deferred, self.failed
        )
    }
}

/// Outcome of the smart-sync gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartSyncOutcome {
    /// Whether the bulk-resume capability was invoked
    pub resumed: bool,
    /// Number of pending, resumable records observed
    pub pending_count: usize,
}

impl SmartSyncOutcome {
    /// The no-op outcome: nothing pending, nothing resumed.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            resumed: false,
            pending_count: 0,
        }
    }
}

impl std::fmt::Display for SmartSyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SmartSync(resumed={}, pending={})",
            self.resumed, self.pending_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_summary_counts() {
        let summary = DrainSummary {
            synced: 3,
            deferred: 1,
            failed: 1,
        };
        assert_eq!(summary.attempted(), 5);
        assert!(!summary.is_idle());
        assert!(DrainSummary::default().is_idle());
    }

    #[test]
    fn test_display_formats() {
        let summary = DrainSummary {
            synced: 2,
            deferred: 0,
            failed: 1,
        };
        assert_eq!(format!("{}", summary), "Drain(synced=2, deferred=0, failed=1)");
        assert_eq!(
            format!("{}", SmartSyncOutcome::idle()),
            "SmartSync(resumed=false, pending=0)"
        );
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the outbox engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! application chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `outbox_engine_` prefix for all metrics
//! - `_total` suffix for counters
//!
//! # Labels
//! - `outcome`: synced, deferred, failed

use metrics::{counter, gauge};

use crate::coordinator::DrainSummary;

/// Record one executed attempt by outcome.
pub fn record_attempt(outcome: &str) {
    counter!(
        "outbox_engine_attempts_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a completed drain pass.
pub fn record_drain(summary: &DrainSummary) {
    counter!("outbox_engine_drains_total").increment(1);
    counter!("outbox_engine_drained_records_total").increment(summary.attempted() as u64);
}

/// Set the current number of pending outbox records.
pub fn set_outbox_pending(count: u64) {
    gauge!("outbox_engine_pending_records").set(count as f64);
}

/// Record a reconnect debounce firing.
pub fn record_reconnect_fire() {
    counter!("outbox_engine_reconnect_fires_total").increment(1);
}

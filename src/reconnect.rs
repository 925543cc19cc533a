// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconnect watcher: turn network flaps into exactly one sync trigger.
//!
//! A small state machine driven by the boolean network-status signal:
//!
//! ```text
//! Offline ──(online)──▶ Debouncing ──(2000 ms quiet)──▶ Idle
//!    ▲                     │  ▲
//!    └──────(offline)──────┘  └──(any flap restarts the timer)
//! ```
//!
//! Only an online transition *after* having been offline arms the timer; a
//! signal that was online from the start is a no-op. When the timer fires, the
//! smart-sync gate runs exactly once, and when the gate resumed work the
//! coordinator drains the outbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::coordinator::SyncCoordinator;

/// Watches the online/offline signal and fires the smart-sync gate after a
/// debounce. Owns a background task; cancel via [`shutdown`](Self::shutdown).
pub struct ReconnectWatcher {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ReconnectWatcher {
    /// Spawn the watcher on the current runtime.
    #[must_use]
    pub fn spawn(
        coordinator: Arc<SyncCoordinator>,
        online_rx: watch::Receiver<bool>,
        debounce: Duration,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(watch_loop(
            coordinator,
            online_rx,
            debounce,
            shutdown.clone(),
        ));
        Self { shutdown, task }
    }

    /// Cancel the pending timer (if any) and stop the watcher.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Reconnect watcher task did not stop cleanly");
        }
    }
}

async fn watch_loop(
    coordinator: Arc<SyncCoordinator>,
    mut online_rx: watch::Receiver<bool>,
    debounce: Duration,
    shutdown: Arc<Notify>,
) {
    // Armed only by an offline→online transition, so an initially-online
    // signal never fires.
    let mut seen_offline = !*online_rx.borrow();
    let mut deadline: Option<Instant> = None;

    debug!(initially_offline = seen_offline, "Reconnect watcher started");

    loop {
        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    debug!("Network signal source dropped, stopping watcher");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online {
                    if seen_offline {
                        // Restarts the window on every flap; only the last
                        // stable online transition fires.
                        deadline = Some(Instant::now() + debounce);
                        debug!(debounce_ms = debounce.as_millis() as u64, "Back online, debouncing");
                    }
                } else {
                    seen_offline = true;
                    if deadline.take().is_some() {
                        debug!("Went offline inside debounce window, timer canceled");
                    }
                }
            }
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                seen_offline = false;
                crate::metrics::record_reconnect_fire();

                let outcome = coordinator.smart_sync().await;
                info!(
                    resumed = outcome.resumed,
                    pending = outcome.pending_count,
                    "Reconnect debounce fired"
                );
                if outcome.resumed {
                    let summary = coordinator.start_sync().await;
                    debug!(%summary, "Post-reconnect drain finished");
                }
            }
            () = shutdown.notified() => {
                debug!("Reconnect watcher shutting down");
                break;
            }
        }
    }
}

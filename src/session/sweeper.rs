// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Background eviction of idle sessions.
//!
//! A sweep walks every stored session and deletes the ones whose last
//! update is older than the idle timeout. The background task is spawned
//! once at startup and stopped through its handle on shutdown; eviction is
//! best-effort, a failed sweep is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::store::SessionStore;
use super::types::SessionConfig;
use crate::error::StoreError;

/// Delete every session idle longer than `idle_timeout`. Returns the
/// number of sessions evicted.
pub async fn sweep_once(
    store: &dyn SessionStore,
    idle_timeout: Duration,
) -> Result<usize, StoreError> {
    let now = Utc::now().timestamp();
    let timeout_secs = idle_timeout.as_secs() as i64;

    let mut evicted = 0;
    for record in store.list_all().await? {
        if record.idle_secs(now) > timeout_secs {
            // Hold the per-session lock so a turn in flight finishes first,
            // then re-read: the turn may have refreshed the session while
            // we waited.
            let _guard = store.lock(&record.id).await;
            let still_idle = match store.get(&record.id).await? {
                Some(current) => current.idle_secs(Utc::now().timestamp()) > timeout_secs,
                None => false,
            };
            if still_idle && store.delete(&record.id).await? {
                debug!(session_id = %record.id, "evicted idle session");
                evicted += 1;
            }
        }
    }
    Ok(evicted)
}

/// Handle to a running background sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Periodic eviction task over a session store.
pub struct EvictionSweeper;

impl EvictionSweeper {
    /// Spawn the background sweep loop. The first sweep runs one full
    /// interval after spawning, not immediately.
    pub fn spawn(store: Arc<dyn SessionStore>, config: SessionConfig) -> SweeperHandle {
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
        let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            // interval fires immediately; consume that first tick so the
            // initial sweep waits a full period.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sweep_once(store.as_ref(), idle_timeout).await {
                            Ok(0) => {}
                            Ok(n) => debug!(evicted = n, "sweep complete"),
                            Err(e) => warn!(error = %e, "sweep failed, will retry"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

//! Periodic store maintenance: transcript retention and cache expiry.
//!
//! Independent of any live session.  The task wakes on a fixed interval,
//! purges transcript rows older than the retention window, and drops
//! expired context-cache rows.  Failures are logged and the task keeps
//! running; it never takes the application down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::store::SecureStore;

// ---------------------------------------------------------------------------
// MaintenanceConfig
// ---------------------------------------------------------------------------

/// Settings for the maintenance task.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Transcripts older than this many days are purged.  `0` keeps nothing.
    pub retention_days: u32,
    /// How often the task runs.
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            interval: Duration::from_secs(60 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Run one maintenance sweep.  Returns `(transcripts_purged, cache_purged)`.
pub fn run_sweep(store: &SecureStore, retention_days: u32) -> (usize, usize) {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let transcripts = match store.purge_transcripts_older_than(cutoff) {
        Ok(n) => n,
        Err(e) => {
            log::warn!("maintenance: transcript purge failed: {e}");
            0
        }
    };
    let cache = match store.purge_expired_cache() {
        Ok(n) => n,
        Err(e) => {
            log::warn!("maintenance: cache purge failed: {e}");
            0
        }
    };
    if transcripts > 0 || cache > 0 {
        log::info!(
            "maintenance: purged {transcripts} transcript rows, {cache} cache rows"
        );
    }
    (transcripts, cache)
}

/// Spawn the periodic maintenance task.  Aborting the returned handle stops
/// it; there is no other shutdown path to forget.
pub fn spawn_maintenance_task(
    store: Arc<SecureStore>,
    config: MaintenanceConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a sweep does not race
        // application startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_sweep(&store, config.retention_days);
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

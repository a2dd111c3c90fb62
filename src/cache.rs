// src/cache.rs
//! TTL cache in front of the [`Aggregator`].
//!
//! Staleness is derived at read time from the instant the stored pass started;
//! nothing marks an entry stale. Refreshes are single-flight: passes are
//! serialised by `refresh_gate`, and a caller that waited on the gate reuses the
//! result of the pass it waited for when that pass already satisfies it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::aggregator::Aggregator;
use crate::snapshot::Snapshot;

pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<Snapshot>,
    /// Start of the pass that produced `snapshot`.
    pub last_update: Instant,
    /// Sequence number of that pass, taken when it started.
    pub epoch: u64,
}

/// Holds the current entry. Writers swap the whole entry; readers clone the `Arc`s.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<CacheEntry>>,
}

impl SnapshotCell {
    pub fn read(&self) -> Option<CacheEntry> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Returns false (and keeps the current entry) if `entry` comes from an older
    /// pass than the stored one.
    pub fn replace(&self, entry: CacheEntry) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        if let Some(cur) = guard.as_ref() {
            if cur.epoch > entry.epoch {
                return false;
            }
        }
        *guard = Some(entry);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    Empty,
    Stale,
    Forced,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub populated: bool,
    pub age_secs: Option<f64>,
    pub ttl_secs: u64,
    pub generation: Option<u64>,
    pub refreshing: bool,
}

pub struct SnapshotCache {
    aggregator: Arc<Aggregator>,
    ttl: Duration,
    cell: Arc<SnapshotCell>,
    refresh_gate: Arc<Mutex<()>>,
    epoch: Arc<AtomicU64>,
}

impl SnapshotCache {
    pub fn new(aggregator: Arc<Aggregator>, ttl: Duration) -> Self {
        Self {
            aggregator,
            ttl,
            cell: Arc::new(SnapshotCell::default()),
            refresh_gate: Arc::new(Mutex::new(())),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current snapshot, recollected first if forced, missing or stale.
    pub async fn get_snapshot(&self, force_refresh: bool) -> Arc<Snapshot> {
        let seen_epoch = self.epoch.load(Ordering::SeqCst);
        if !force_refresh {
            if let Some(entry) = self.cell.read() {
                if !self.is_stale(&entry, Instant::now()) {
                    debug!(generation = entry.snapshot.generation, "stats cache hit");
                    return entry.snapshot;
                }
            }
        }
        self.refresh(force_refresh, seen_epoch).await
    }

    /// Unconditional recollection, for the admin trigger.
    pub async fn force_refresh(&self) -> Arc<Snapshot> {
        self.get_snapshot(true).await
    }

    /// Stored snapshot without any refresh.
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.cell.read().map(|e| e.snapshot)
    }

    pub fn status(&self) -> CacheStatus {
        let entry = self.cell.read();
        CacheStatus {
            populated: entry.is_some(),
            age_secs: entry
                .as_ref()
                .map(|e| Instant::now().saturating_duration_since(e.last_update).as_secs_f64()),
            ttl_secs: self.ttl.as_secs(),
            generation: entry.as_ref().map(|e| e.snapshot.generation),
            refreshing: self.refresh_gate.try_lock().is_err(),
        }
    }

    fn is_stale(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_update) >= self.ttl
    }

    async fn refresh(&self, forced: bool, seen_epoch: u64) -> Arc<Snapshot> {
        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;

        let current = self.cell.read();
        if let Some(entry) = &current {
            // forced: a pass that started after our request counts as our refresh
            let satisfied = if forced {
                entry.epoch > seen_epoch
            } else {
                !self.is_stale(entry, Instant::now())
            };
            if satisfied {
                debug!(forced, generation = entry.snapshot.generation, "joined in-flight refresh");
                return Arc::clone(&entry.snapshot);
            }
        }

        let reason = match (&current, forced) {
            (_, true) => RefreshReason::Forced,
            (None, false) => RefreshReason::Empty,
            (Some(_), false) => RefreshReason::Stale,
        };

        // The pass owns the gate, so it completes even if this caller is dropped.
        let aggregator = Arc::clone(&self.aggregator);
        let cell = Arc::clone(&self.cell);
        let epoch_counter = Arc::clone(&self.epoch);
        let pass = tokio::spawn(async move {
            let _gate = gate;
            let epoch = epoch_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let started = Instant::now();
            let snapshot = Arc::new(aggregator.collect().await);
            cell.replace(CacheEntry {
                snapshot: Arc::clone(&snapshot),
                last_update: started,
                epoch,
            });
            info!(
                ?reason,
                generation = snapshot.generation,
                ok = snapshot.ok_count(),
                "refreshed storage stats"
            );
            snapshot
        });

        match pass.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(?reason, error = %e, "refresh task failed; serving previous snapshot");
                match self.cell.read() {
                    Some(entry) => entry.snapshot,
                    None => Arc::new(Snapshot::unavailable(
                        &self.aggregator.source_names(),
                        format!("refresh task failed: {e}"),
                    )),
                }
            }
        }
    }
}

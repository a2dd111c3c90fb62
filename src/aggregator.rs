// src/aggregator.rs
//! Runs every configured backend client once and merges the outcomes into a
//! [`Snapshot`]. Each client runs on its own task, so a slow or panicking source
//! neither delays nor cancels the others.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::snapshot::Snapshot;
use crate::sources::{BackendClient, ErrorKind, SourceResult};

pub type DynBackendClient = Arc<dyn BackendClient>;

pub struct Aggregator {
    clients: Vec<DynBackendClient>,
    passes: AtomicU64,
}

impl Aggregator {
    pub fn new(clients: Vec<DynBackendClient>) -> Self {
        Self {
            clients,
            passes: AtomicU64::new(0),
        }
    }

    pub(crate) fn source_names(&self) -> Vec<&'static str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    /// Never fails; a source that could not be reached shows up as an `Err` entry.
    pub async fn collect(&self) -> Snapshot {
        let t0 = Instant::now();

        let handles: Vec<_> = self
            .clients
            .iter()
            .map(|c| {
                let client = Arc::clone(c);
                (c.name(), tokio::spawn(async move { client.fetch_stats().await }))
            })
            .collect();

        let mut sources = BTreeMap::new();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => {
                    error!(source = name, error = %e, "collection task failed");
                    SourceResult::err(ErrorKind::Internal, format!("collection task failed: {e}"))
                }
            };
            sources.insert(name, result);
        }

        let generation = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Snapshot {
            sources,
            collected_at: chrono::Utc::now(),
            generation,
        };

        info!(
            generation,
            ok = snapshot.ok_count(),
            failed = snapshot.sources.len() - snapshot.ok_count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "collection pass finished"
        );
        snapshot
    }
}

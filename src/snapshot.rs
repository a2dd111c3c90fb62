// src/snapshot.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::sources::{ErrorKind, SourceResult};

/// Combined result of one collection pass. Shared read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sources: BTreeMap<&'static str, SourceResult>,
    pub collected_at: DateTime<Utc>,
    /// Pass counter of the aggregator that produced this snapshot.
    pub generation: u64,
}

impl Snapshot {
    /// Every source marked `Internal`; served only when a pass died before
    /// anything was cached.
    pub fn unavailable(names: &[&'static str], message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            sources: names
                .iter()
                .map(|n| (*n, SourceResult::err(ErrorKind::Internal, message.clone())))
                .collect(),
            collected_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceResult> {
        self.sources.get(name)
    }

    /// Seconds since epoch with sub-second precision, as served on the wire.
    pub fn timestamp_secs(&self) -> f64 {
        self.collected_at.timestamp_micros() as f64 / 1_000_000.0
    }

    pub fn ok_count(&self) -> usize {
        self.sources.values().filter(|r| r.is_ok()).count()
    }
}

// {"mongodb": .., "sqlite": .., "timestamp": 1700000000.123}
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sources.len() + 1))?;
        for (name, result) in &self.sources {
            map.serialize_entry(name, result)?;
        }
        map.serialize_entry("timestamp", &self.timestamp_secs())?;
        map.end()
    }
}

// src/sources/types.rs
use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy shared by every backend client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend unreachable or refused us; fails the whole source.
    ConnectionError,
    /// One collection or server metric could not be read; only degrades fields.
    PartialStatsError,
    /// Relational service answered with a non-2xx status.
    UpstreamStatusError,
    /// Timeout or network failure talking to the relational service.
    TransportError,
    /// 2xx answer whose body is not JSON.
    MalformedResponse,
    /// The collection task for a source died before returning.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::PartialStatsError => "partial_stats_error",
            ErrorKind::UpstreamStatusError => "upstream_status_error",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Error used inside clients; never leaves `fetch_stats`.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Connection(String),
    #[error("{0}")]
    PartialStats(String),
    #[error("{0}")]
    UpstreamStatus(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Malformed(String),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Connection(_) => ErrorKind::ConnectionError,
            BackendError::PartialStats(_) => ErrorKind::PartialStatsError,
            BackendError::UpstreamStatus(_) => ErrorKind::UpstreamStatusError,
            BackendError::Transport(_) => ErrorKind::TransportError,
            BackendError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub record_count: u64,
    pub total_size: u64,
    pub storage_size: u64,
    pub avg_object_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub total_size: u64,
    pub used_space: u64,
    pub free_space: u64,
    pub collections: BTreeMap<String, CollectionInfo>,
}

/// Document-store payload, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStoreStats {
    pub databases: BTreeMap<String, DatabaseInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStats {
    Documents(DocumentStoreStats),
    /// Relational-service body, not interpreted.
    Passthrough(serde_json::Value),
}

/// Outcome of one `fetch_stats` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    Ok(SourceStats),
    Err { kind: ErrorKind, message: String },
}

impl SourceResult {
    pub fn err(kind: ErrorKind, message: impl Into<String>) -> Self {
        SourceResult::Err {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SourceResult::Ok(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SourceResult::Ok(_) => None,
            SourceResult::Err { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<SourceStats, BackendError>> for SourceResult {
    fn from(r: Result<SourceStats, BackendError>) -> Self {
        match r {
            Ok(stats) => SourceResult::Ok(stats),
            Err(e) => SourceResult::err(e.kind(), e.to_string()),
        }
    }
}

// Wire shape understood by the dashboard:
//   documents   -> {"status":"ok","databases":{..}}
//   passthrough -> body as received
//   error       -> {"status":"error","kind":"..","error":".."}
impl Serialize for SourceResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceResult::Ok(SourceStats::Passthrough(v)) => v.serialize(serializer),
            SourceResult::Ok(SourceStats::Documents(d)) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", "ok")?;
                map.serialize_entry("databases", &d.databases)?;
                map.end()
            }
            SourceResult::Err { kind, message } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("status", "error")?;
                map.serialize_entry("kind", kind)?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

/// One external statistics provider.
#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    /// Never fails: every failure mode comes back as `SourceResult::Err`.
    async fn fetch_stats(&self) -> SourceResult;
    fn name(&self) -> &'static str;
}

// src/sources/document_store.rs
//! Document-store statistics client.
//!
//! Only a failed connection, ping or database listing fails the source. Anything
//! below that (server memory stats, collection listing, per-collection count or
//! stats) is logged and folded into zero-valued fields of the affected entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::sources::types::{
    BackendClient, BackendError, CollectionInfo, DatabaseInfo, DocumentStoreStats, SourceResult,
    SourceStats,
};

pub const DOCUMENT_SOURCE_NAME: &str = "mongodb";

pub const DEFAULT_EXCLUDED_DATABASES: [&str; 3] = ["admin", "local", "config"];

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Size figures reported by `collStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollStats {
    pub size: u64,
    pub storage_size: u64,
    pub avg_obj_size: u64,
}

/// Server memory figures in MiB, as reported by `serverStatus.mem`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemStats {
    pub resident_mib: u64,
    pub available_mib: u64,
}

/// Narrow contract towards the document store. Implementations report raw errors;
/// classification happens in [`DocumentStoreClient`].
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn list_database_names(&self) -> Result<Vec<String>>;
    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>>;
    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64>;
    async fn collection_stats(&self, database: &str, collection: &str) -> Result<CollStats>;
    async fn server_memory(&self) -> Result<MemStats>;
}

/// Underscores become spaces. Display only; lookups keep the raw name.
pub fn display_name(raw: &str) -> String {
    raw.replace('_', " ")
}

pub struct DocumentStoreClient<S> {
    store: Arc<S>,
    excluded: Vec<String>,
}

impl<S: DocumentStore> DocumentStoreClient<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            excluded: DEFAULT_EXCLUDED_DATABASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_excluded_databases(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    fn is_excluded(&self, db: &str) -> bool {
        self.excluded.iter().any(|e| e == db)
    }

    async fn try_fetch(&self) -> Result<DocumentStoreStats, BackendError> {
        self.store
            .ping()
            .await
            .map_err(|e| BackendError::Connection(format!("{e:#}")))?;
        let names = self
            .store
            .list_database_names()
            .await
            .map_err(|e| BackendError::Connection(format!("{e:#}")))?;

        let mem = self.server_memory().await;

        let mut out = DocumentStoreStats::default();
        for db in names.iter().filter(|n| !self.is_excluded(n)) {
            let info = self.database_info(db, mem).await;
            insert_display(&mut out.databases, db, info, "database");
        }
        Ok(out)
    }

    async fn server_memory(&self) -> MemStats {
        match self.store.server_memory().await {
            Ok(m) => m,
            Err(e) => {
                let err = BackendError::PartialStats(format!("serverStatus: {e:#}"));
                warn!(source = DOCUMENT_SOURCE_NAME, kind = ?err.kind(), error = %err, "server memory stats unavailable");
                MemStats::default()
            }
        }
    }

    async fn database_info(&self, db: &str, mem: MemStats) -> DatabaseInfo {
        let mut info = DatabaseInfo {
            used_space: mem.resident_mib.saturating_mul(BYTES_PER_MIB),
            free_space: mem.available_mib.saturating_mul(BYTES_PER_MIB),
            ..DatabaseInfo::default()
        };

        let collections = match self.store.list_collection_names(db).await {
            Ok(c) => c,
            Err(e) => {
                warn!(source = DOCUMENT_SOURCE_NAME, database = db, error = %format!("{e:#}"), "listing collections failed");
                return info;
            }
        };

        for coll in &collections {
            let ci = self.collection_info(db, coll).await;
            info.total_size = info.total_size.saturating_add(ci.total_size);
            insert_display(&mut info.collections, coll, ci, "collection");
        }
        info
    }

    async fn collection_info(&self, db: &str, coll: &str) -> CollectionInfo {
        let record_count = match self.store.count_documents(db, coll).await {
            Ok(n) => n,
            Err(e) => {
                warn!(source = DOCUMENT_SOURCE_NAME, database = db, collection = coll, error = %format!("{e:#}"), "count failed; record_count=0");
                0
            }
        };

        match self.store.collection_stats(db, coll).await {
            Ok(s) => CollectionInfo {
                record_count,
                total_size: s.size,
                storage_size: s.storage_size,
                avg_object_size: if record_count > 0 { s.avg_obj_size } else { 0 },
            },
            Err(e) => {
                warn!(source = DOCUMENT_SOURCE_NAME, database = db, collection = coll, error = %format!("{e:#}"), "collStats failed; sizes zeroed");
                CollectionInfo {
                    record_count,
                    ..CollectionInfo::default()
                }
            }
        }
    }
}

// Last write wins when two raw names map to the same display name.
fn insert_display<V>(map: &mut BTreeMap<String, V>, raw: &str, value: V, what: &'static str) {
    let key = display_name(raw);
    if map.insert(key.clone(), value).is_some() {
        warn!(source = DOCUMENT_SOURCE_NAME, raw, display = %key, what, "display name collision; keeping last");
    }
}

#[async_trait::async_trait]
impl<S: DocumentStore + 'static> BackendClient for DocumentStoreClient<S> {
    async fn fetch_stats(&self) -> SourceResult {
        let res = self.try_fetch().await;
        match &res {
            Ok(stats) => debug!(databases = stats.databases.len(), "document store stats collected"),
            Err(e) => warn!(source = DOCUMENT_SOURCE_NAME, error = %e, "document store unavailable"),
        }
        res.map(SourceStats::Documents).into()
    }

    fn name(&self) -> &'static str {
        DOCUMENT_SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::ErrorKind;
    use anyhow::anyhow;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeStore {
        down: bool,
        list_fails: bool,
        mem_fails: bool,
        dbs: Vec<(&'static str, Vec<&'static str>)>,
        broken_collections: HashSet<&'static str>,
        uncountable: HashSet<&'static str>,
        unlistable_dbs: HashSet<&'static str>,
    }

    #[async_trait::async_trait]
    impl DocumentStore for FakeStore {
        async fn ping(&self) -> Result<()> {
            if self.down {
                return Err(anyhow!("server selection timeout"));
            }
            Ok(())
        }
        async fn list_database_names(&self) -> Result<Vec<String>> {
            if self.list_fails {
                return Err(anyhow!("not authorized on admin"));
            }
            Ok(self.dbs.iter().map(|(d, _)| d.to_string()).collect())
        }
        async fn list_collection_names(&self, database: &str) -> Result<Vec<String>> {
            if self.unlistable_dbs.contains(database) {
                return Err(anyhow!("listCollections failed"));
            }
            Ok(self
                .dbs
                .iter()
                .find(|(d, _)| *d == database)
                .map(|(_, c)| c.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default())
        }
        async fn count_documents(&self, _database: &str, collection: &str) -> Result<u64> {
            if self.uncountable.contains(collection) {
                return Err(anyhow!("count failed"));
            }
            Ok(collection.len() as u64)
        }
        async fn collection_stats(&self, _database: &str, collection: &str) -> Result<CollStats> {
            if self.broken_collections.contains(collection) {
                return Err(anyhow!("collection locked"));
            }
            Ok(CollStats {
                size: 1000,
                storage_size: 4096,
                avg_obj_size: 100,
            })
        }
        async fn server_memory(&self) -> Result<MemStats> {
            if self.mem_fails {
                return Err(anyhow!("serverStatus denied"));
            }
            Ok(MemStats {
                resident_mib: 2,
                available_mib: 3,
            })
        }
    }

    fn documents(r: SourceResult) -> DocumentStoreStats {
        match r {
            SourceResult::Ok(SourceStats::Documents(d)) => d,
            other => panic!("expected document stats, got {other:?}"),
        }
    }

    #[test]
    fn display_name_replaces_every_underscore() {
        assert_eq!(display_name("user_events"), "user events");
        assert_eq!(display_name("a__b_"), "a  b ");
        assert_eq!(display_name("plain"), "plain");
    }

    #[tokio::test]
    async fn system_databases_are_skipped_and_sizes_summed() {
        let store = FakeStore {
            dbs: vec![
                ("admin", vec!["system.users"]),
                ("local", vec!["startup_log"]),
                ("config", vec!["system.sessions"]),
                ("shop", vec!["orders", "user_events"]),
            ],
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let stats = documents(client.fetch_stats().await);

        assert_eq!(stats.databases.keys().collect::<Vec<_>>(), vec!["shop"]);
        let shop = &stats.databases["shop"];
        assert_eq!(shop.total_size, 2000);
        assert_eq!(shop.used_space, 2 * 1024 * 1024);
        assert_eq!(shop.free_space, 3 * 1024 * 1024);
        assert!(shop.collections.contains_key("user events"));
        assert!(!shop.collections.contains_key("user_events"));
    }

    #[tokio::test]
    async fn broken_collection_keeps_count_and_zeroes_sizes() {
        let store = FakeStore {
            dbs: vec![("shop", vec!["orders", "audit_log"])],
            broken_collections: HashSet::from(["audit_log"]),
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let stats = documents(client.fetch_stats().await);
        let shop = &stats.databases["shop"];

        assert_eq!(
            shop.collections["audit log"],
            CollectionInfo {
                record_count: "audit_log".len() as u64,
                total_size: 0,
                storage_size: 0,
                avg_object_size: 0,
            }
        );
        assert_eq!(
            shop.collections["orders"],
            CollectionInfo {
                record_count: 6,
                total_size: 1000,
                storage_size: 4096,
                avg_object_size: 100,
            }
        );
        assert_eq!(shop.total_size, 1000);
    }

    #[tokio::test]
    async fn failed_count_still_reports_sizes() {
        let store = FakeStore {
            dbs: vec![("shop", vec!["orders"])],
            uncountable: HashSet::from(["orders"]),
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let stats = documents(client.fetch_stats().await);
        let orders = &stats.databases["shop"].collections["orders"];
        assert_eq!(orders.record_count, 0);
        assert_eq!(orders.total_size, 1000);
        assert_eq!(orders.avg_object_size, 0);
    }

    #[tokio::test]
    async fn server_memory_failure_only_zeroes_space_fields() {
        let store = FakeStore {
            dbs: vec![("shop", vec!["orders"])],
            mem_fails: true,
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let shop = documents(client.fetch_stats().await).databases["shop"].clone();
        assert_eq!(shop.used_space, 0);
        assert_eq!(shop.free_space, 0);
        assert_eq!(shop.total_size, 1000);
        assert_eq!(shop.collections.len(), 1);
    }

    #[tokio::test]
    async fn unlistable_database_is_kept_without_collections() {
        let store = FakeStore {
            dbs: vec![("shop", vec!["orders"]), ("crm", vec!["leads"])],
            unlistable_dbs: HashSet::from(["crm"]),
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let stats = documents(client.fetch_stats().await);
        assert!(stats.databases["crm"].collections.is_empty());
        assert_eq!(stats.databases["shop"].collections.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_whole_source() {
        let client = DocumentStoreClient::new(Arc::new(FakeStore {
            down: true,
            ..Default::default()
        }));
        let r = client.fetch_stats().await;
        assert_eq!(r.error_kind(), Some(ErrorKind::ConnectionError));
        match r {
            SourceResult::Err { message, .. } => assert!(message.contains("server selection")),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn database_listing_failure_fails_whole_source() {
        let client = DocumentStoreClient::new(Arc::new(FakeStore {
            list_fails: true,
            ..Default::default()
        }));
        assert_eq!(
            client.fetch_stats().await.error_kind(),
            Some(ErrorKind::ConnectionError)
        );
    }

    #[tokio::test]
    async fn colliding_display_names_keep_last_entry() {
        // "a_b" and "a b" both display as "a b"
        let store = FakeStore {
            dbs: vec![("shop", vec!["a_b", "a b!"])],
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let shop = documents(client.fetch_stats().await).databases["shop"].clone();
        assert_eq!(shop.collections.len(), 2);

        let store = FakeStore {
            dbs: vec![("shop", vec!["a_b", "a b"])],
            broken_collections: HashSet::from(["a b"]),
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store));
        let shop = documents(client.fetch_stats().await).databases["shop"].clone();
        assert_eq!(shop.collections.len(), 1);
        // "a b" was listed last and its stats call failed
        assert_eq!(shop.collections["a b"].total_size, 0);
    }

    #[tokio::test]
    async fn display_names_are_stable_across_passes() {
        let store = Arc::new(FakeStore {
            dbs: vec![("app_data", vec!["user_events"])],
            ..Default::default()
        });
        let client = DocumentStoreClient::new(store);
        let first = documents(client.fetch_stats().await);
        let second = documents(client.fetch_stats().await);
        assert_eq!(first, second);
        assert!(first.databases["app data"]
            .collections
            .contains_key("user events"));
    }

    #[tokio::test]
    async fn custom_exclusions_replace_defaults() {
        let store = FakeStore {
            dbs: vec![("admin", vec![]), ("scratch", vec![])],
            ..Default::default()
        };
        let client = DocumentStoreClient::new(Arc::new(store))
            .with_excluded_databases(vec!["scratch".into()]);
        let stats = documents(client.fetch_stats().await);
        assert_eq!(stats.databases.keys().collect::<Vec<_>>(), vec!["admin"]);
    }
}

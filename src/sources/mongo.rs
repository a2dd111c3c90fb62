// src/sources/mongo.rs
use std::time::Duration;

use anyhow::{Context, Result};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;
use tokio::sync::OnceCell;

use crate::sources::document_store::{CollStats, DocumentStore, MemStats};

/// `DocumentStore` backed by the official MongoDB driver.
///
/// The driver client is built lazily on first use and then reused; building it
/// does no I/O, so a bad URI surfaces on the first pass instead of at startup.
pub struct MongoStore {
    uri: String,
    admin_db: String,
    connect_timeout: Duration,
    client: OnceCell<Client>,
}

impl MongoStore {
    pub fn new(uri: impl Into<String>, admin_db: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            uri: uri.into(),
            admin_db: admin_db.into(),
            connect_timeout,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let mut opts = ClientOptions::parse(&self.uri)
                    .await
                    .with_context(|| format!("parsing mongodb uri {}", redact(&self.uri)))?;
                opts.connect_timeout = Some(self.connect_timeout);
                opts.server_selection_timeout = Some(self.connect_timeout);
                opts.app_name = Some("storage-stats-aggregator".to_string());
                Client::with_options(opts).context("building mongodb client")
            })
            .await
    }
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .database(&self.admin_db)
            .run_command(doc! { "ping": 1 })
            .await
            .context("ping")?;
        Ok(())
    }

    async fn list_database_names(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        client
            .list_database_names()
            .await
            .context("listDatabases")
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        client
            .database(database)
            .list_collection_names()
            .await
            .with_context(|| format!("listCollections on {database}"))
    }

    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64> {
        let client = self.client().await?;
        client
            .database(database)
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .with_context(|| format!("count on {database}.{collection}"))
    }

    async fn collection_stats(&self, database: &str, collection: &str) -> Result<CollStats> {
        let client = self.client().await?;
        let stats = client
            .database(database)
            .run_command(doc! { "collStats": collection })
            .await
            .with_context(|| format!("collStats on {database}.{collection}"))?;
        Ok(CollStats {
            size: as_u64(stats.get("size")),
            storage_size: as_u64(stats.get("storageSize")),
            avg_obj_size: as_u64(stats.get("avgObjSize")),
        })
    }

    async fn server_memory(&self) -> Result<MemStats> {
        let client = self.client().await?;
        let status = client
            .database(&self.admin_db)
            .run_command(doc! { "serverStatus": 1 })
            .await
            .context("serverStatus")?;
        let mem = status.get_document("mem").ok();
        Ok(MemStats {
            resident_mib: as_u64(mem.and_then(|m| m.get("resident"))),
            available_mib: as_u64(mem.and_then(|m| m.get("available"))),
        })
    }
}

// Numeric fields come back as int32, int64 or double depending on server version.
fn as_u64(v: Option<&Bson>) -> u64 {
    match v {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(f)) if f.is_finite() && *f > 0.0 => *f as u64,
        _ => 0,
    }
}

/// Strip credentials before a URI ends up in a log line or error message.
pub(crate) fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}

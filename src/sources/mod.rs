// src/sources/mod.rs
pub mod document_store;
pub mod mongo;
pub mod relational;
pub mod types;

pub use document_store::{display_name, DocumentStore, DocumentStoreClient, DOCUMENT_SOURCE_NAME};
pub use mongo::MongoStore;
pub use relational::{RelationalServiceClient, RELATIONAL_SOURCE_NAME};
pub use types::{
    BackendClient, BackendError, CollectionInfo, DatabaseInfo, DocumentStoreStats, ErrorKind,
    SourceResult, SourceStats,
};

//! Collaborator traits for the two stores.
//!
//! Both traits are object safe so that the jobs can hold
//! `Arc<dyn OperationalStore>` / `Arc<dyn ArchiveStore>` chosen at startup,
//! and tests can substitute in-memory or fault-injecting fakes.

use std::pin::Pin;

use async_trait::async_trait;
use coldvault_core::{ColdVaultResult, Record, RecordQuery};
use tokio_stream::Stream;

/// Lazy, finite sequence of query results. Not restartable: a new call to
/// [`OperationalStore::query_records`] re-issues the query from the start.
pub type RecordStream<'a> = Pin<Box<dyn Stream<Item = ColdVaultResult<Record>> + Send + 'a>>;

/// Keyed, queryable document store holding live records.
///
/// Point operations address a record by `id` plus `partitionKey` and fail
/// with `StorageError::NotFound { store: Operational, .. }` when it is absent.
#[async_trait]
pub trait OperationalStore: Send + Sync {
    /// Backend label for logs.
    fn name(&self) -> &'static str;

    /// Cross-partition query. Pages are fetched as the stream is polled.
    fn query_records<'a>(&'a self, query: &'a RecordQuery) -> RecordStream<'a>;

    /// Point read.
    async fn read_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<Record>;

    /// Point delete.
    async fn delete_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<()>;

    /// Insert or replace a record under its own `id` and `partitionKey`.
    async fn upsert_record(&self, record: &Record) -> ColdVaultResult<()>;
}

/// Path-addressed blob store holding archived records.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Backend label for logs.
    fn name(&self) -> &'static str;

    /// Write `body` at `path`, replacing any existing blob.
    async fn put_blob(&self, path: &str, body: Vec<u8>) -> ColdVaultResult<()>;

    /// Read the blob at `path`; NotFound when nothing was written there.
    async fn get_blob(&self, path: &str) -> ColdVaultResult<Vec<u8>>;
}

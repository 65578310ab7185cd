//! LMDB-backed operational store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a durable, memory-mapped
//! record store on local disk.
//!
//! # Key Format
//!
//! `[partition key length: u32 BE][partition key][id]`, so all records of a
//! partition are contiguous and no separator byte can be forged by a key.
//! Values are the record's compact JSON.
//!
//! # Queries
//!
//! A query scans the whole keyspace in pages of `page_size` keys. Each page
//! opens its own read transaction, so no transaction outlives an await point
//! and deletes made while the stream is consumed are safe.

use std::ops::Bound;
use std::path::Path;

use async_stream::stream;
use async_trait::async_trait;
use coldvault_core::constants::DEFAULT_QUERY_PAGE_SIZE;
use coldvault_core::{
    ColdVaultError, ColdVaultResult, Record, RecordQuery, StorageError, StoreKind,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::traits::{OperationalStore, RecordStream};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for ColdVaultError {
    fn from(e: LmdbStoreError) -> Self {
        StorageError::unavailable(StoreKind::Operational, e.to_string()).into()
    }
}

impl From<heed::Error> for LmdbStoreError {
    fn from(e: heed::Error) -> Self {
        LmdbStoreError::Transaction(e.to_string())
    }
}

/// Operational store persisted in an LMDB environment.
pub struct LmdbOperationalStore {
    env: Env,
    records: Database<Bytes, Bytes>,
    page_size: usize,
}

struct Page {
    last_key: Option<Vec<u8>>,
    records: Vec<Record>,
}

impl LmdbOperationalStore {
    /// Open or create the store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let records: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("records"))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            records,
            page_size: DEFAULT_QUERY_PAGE_SIZE,
        })
    }

    /// Set how many keys a query reads per transaction.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.records.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> Result<bool, LmdbStoreError> {
        Ok(self.len()? == 0)
    }

    fn page_after(&self, after: Option<&[u8]>, query: &RecordQuery) -> ColdVaultResult<Page> {
        let rtxn = self.env.read_txn().map_err(LmdbStoreError::from)?;
        let range: (Bound<&[u8]>, Bound<&[u8]>) = match after {
            Some(key) => (Bound::Excluded(key), Bound::Unbounded),
            None => (Bound::Unbounded, Bound::Unbounded),
        };
        let iter = self
            .records
            .range(&rtxn, &range)
            .map_err(LmdbStoreError::from)?;

        let mut last_key = None;
        let mut records = Vec::new();
        for entry in iter.take(self.page_size) {
            let (key, value) = entry.map_err(LmdbStoreError::from)?;
            last_key = Some(key.to_vec());
            let record = decode_record(key, value)?;
            if query.matches(&record) {
                records.push(record);
            }
        }

        Ok(Page { last_key, records })
    }
}

impl std::fmt::Debug for LmdbOperationalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbOperationalStore")
            .field("path", &self.env.path())
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn encode_key(id: &str, partition_key: &str) -> Vec<u8> {
    let pk = partition_key.as_bytes();
    let mut key = Vec::with_capacity(4 + pk.len() + id.len());
    key.extend_from_slice(&(pk.len() as u32).to_be_bytes());
    key.extend_from_slice(pk);
    key.extend_from_slice(id.as_bytes());
    key
}

fn decode_record(key: &[u8], value: &[u8]) -> ColdVaultResult<Record> {
    Record::from_slice(value).map_err(|e| {
        StorageError::Corrupt {
            store: StoreKind::Operational,
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl OperationalStore for LmdbOperationalStore {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    fn query_records<'a>(&'a self, query: &'a RecordQuery) -> RecordStream<'a> {
        Box::pin(stream! {
            let mut after: Option<Vec<u8>> = None;
            loop {
                let page: ColdVaultResult<Page> = self.page_after(after.as_deref(), query);
                match page {
                    Ok(page) => {
                        let Some(last_key) = page.last_key else { break };
                        for record in page.records {
                            yield Ok(record);
                        }
                        after = Some(last_key);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    async fn read_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<Record> {
        let key = encode_key(id, partition_key);
        let rtxn = self.env.read_txn().map_err(LmdbStoreError::from)?;
        match self
            .records
            .get(&rtxn, &key)
            .map_err(LmdbStoreError::from)?
        {
            Some(value) => decode_record(&key, value),
            None => Err(StorageError::not_found(StoreKind::Operational, id).into()),
        }
    }

    async fn delete_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<()> {
        let key = encode_key(id, partition_key);
        let mut wtxn = self.env.write_txn().map_err(LmdbStoreError::from)?;
        let deleted = self
            .records
            .delete(&mut wtxn, &key)
            .map_err(LmdbStoreError::from)?;
        wtxn.commit().map_err(LmdbStoreError::from)?;

        if deleted {
            Ok(())
        } else {
            Err(StorageError::not_found(StoreKind::Operational, id).into())
        }
    }

    async fn upsert_record(&self, record: &Record) -> ColdVaultResult<()> {
        let key = encode_key(record.id()?, record.partition_key()?);
        let value = record.to_json_bytes()?;

        let mut wtxn = self.env.write_txn().map_err(LmdbStoreError::from)?;
        self.records
            .put(&mut wtxn, &key, &value)
            .map_err(LmdbStoreError::from)?;
        wtxn.commit().map_err(LmdbStoreError::from)?;
        Ok(())
    }
}

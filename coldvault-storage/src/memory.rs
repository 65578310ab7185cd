//! In-memory stores.
//!
//! Used by tests and by the `memory` backends. The operational store pages
//! through its map by key like the LMDB backend does, releasing the lock
//! between pages so that deletes issued while a query stream is being
//! consumed are safe.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_stream::stream;
use async_trait::async_trait;
use coldvault_core::constants::DEFAULT_QUERY_PAGE_SIZE;
use coldvault_core::{ColdVaultResult, Record, RecordQuery, StorageError, StoreKind};

use crate::traits::{ArchiveStore, OperationalStore, RecordStream};

type RecordKey = (String, String);

// ============================================================================
// OPERATIONAL STORE
// ============================================================================

/// Operational store backed by an ordered map keyed by (partitionKey, id).
#[derive(Debug)]
pub struct InMemoryOperationalStore {
    records: RwLock<BTreeMap<RecordKey, Record>>,
    page_size: usize,
}

struct Page {
    last_key: Option<RecordKey>,
    records: Vec<Record>,
}

impl InMemoryOperationalStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_QUERY_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record with this id and partition key is live.
    pub fn contains(&self, id: &str, partition_key: &str) -> bool {
        self.records
            .read()
            .map(|r| r.contains_key(&(partition_key.to_string(), id.to_string())))
            .unwrap_or(false)
    }

    /// Snapshot of all live records in key order.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    fn page_after(&self, after: Option<&RecordKey>, query: &RecordQuery) -> ColdVaultResult<Page> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        let scanned: Vec<(&RecordKey, &Record)> = match after {
            Some(key) => records
                .range::<RecordKey, _>((
                    std::ops::Bound::Excluded(key),
                    std::ops::Bound::Unbounded,
                ))
                .take(self.page_size)
                .collect(),
            None => records.iter().take(self.page_size).collect(),
        };

        Ok(Page {
            last_key: scanned.last().map(|(key, _)| (*key).clone()),
            records: scanned
                .into_iter()
                .filter(|(_, record)| query.matches(record))
                .map(|(_, record)| record.clone())
                .collect(),
        })
    }
}

impl Default for InMemoryOperationalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationalStore for InMemoryOperationalStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn query_records<'a>(&'a self, query: &'a RecordQuery) -> RecordStream<'a> {
        Box::pin(stream! {
            let mut after: Option<RecordKey> = None;
            loop {
                let page: ColdVaultResult<Page> = self.page_after(after.as_ref(), query);
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
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        records
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(StoreKind::Operational, id).into())
    }

    async fn delete_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<()> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        match records.remove(&(partition_key.to_string(), id.to_string())) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(StoreKind::Operational, id).into()),
        }
    }

    async fn upsert_record(&self, record: &Record) -> ColdVaultResult<()> {
        let key = (
            record.partition_key()?.to_string(),
            record.id()?.to_string(),
        );
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(key, record.clone());
        Ok(())
    }
}

// ============================================================================
// ARCHIVE STORE
// ============================================================================

/// Counters of archive store traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStoreStats {
    pub puts: u64,
    pub gets: u64,
}

/// Archive store backed by a path -> bytes map.
#[derive(Debug, Default)]
pub struct InMemoryArchiveStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    puts: AtomicU64,
    gets: AtomicU64,
}

impl InMemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All blob paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.blobs
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Blob contents without counting as a read.
    pub fn peek(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().ok().and_then(|b| b.get(path).cloned())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ArchiveStoreStats {
        ArchiveStoreStats {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ArchiveStore for InMemoryArchiveStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put_blob(&self, path: &str, body: Vec<u8>) -> ColdVaultResult<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let mut blobs = self.blobs.write().map_err(|_| StorageError::LockPoisoned)?;
        blobs.insert(path.to_string(), body);
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> ColdVaultResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let blobs = self.blobs.read().map_err(|_| StorageError::LockPoisoned)?;
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found(StoreKind::Archive, path).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    async fn seeded(page_size: usize) -> InMemoryOperationalStore {
        let store = InMemoryOperationalStore::with_page_size(page_size);
        for (i, date) in [
            "2023-01-01T00:00:00",
            "2024-06-01T00:00:00",
            "2023-02-01T00:00:00",
            "2024-07-01T00:00:00",
            "2023-03-01T00:00:00",
        ]
        .iter()
        .enumerate()
        {
            let id = format!("r{}", i);
            store
                .upsert_record(&Record::from_keys(&id, format!("p{}", i % 2), *date))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_query_pages_through_all_partitions() {
        for page_size in [1, 2, 3, 100] {
            let store = seeded(page_size).await;
            let query = RecordQuery::date_before("2024-01-01");
            let mut ids: Vec<String> = store
                .query_records(&query)
                .map(|r| r.unwrap().id().unwrap().to_string())
                .collect()
                .await;
            ids.sort();
            assert_eq!(ids, vec!["r0", "r2", "r4"], "page size {}", page_size);
        }
    }

    #[tokio::test]
    async fn test_delete_while_streaming() {
        let store = seeded(2).await;
        let query = RecordQuery::date_before("2024-01-01");
        let mut stream = store.query_records(&query);
        let mut deleted = 0;
        while let Some(record) = stream.next().await {
            let record = record.unwrap();
            store
                .delete_record(record.id().unwrap(), record.partition_key().unwrap())
                .await
                .unwrap();
            deleted += 1;
        }
        assert_eq!(deleted, 3);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_point_operations_report_not_found() {
        let store = seeded(10).await;
        assert!(store.read_record("r0", "p0").await.is_ok());
        // Wrong partition key
        let err = store.read_record("r0", "p1").await.unwrap_err();
        assert!(err.is_not_found_in(StoreKind::Operational));

        store.delete_record("r0", "p0").await.unwrap();
        let err = store.delete_record("r0", "p0").await.unwrap_err();
        assert!(err.is_not_found_in(StoreKind::Operational));
    }

    #[tokio::test]
    async fn test_upsert_requires_keys() {
        let store = InMemoryOperationalStore::new();
        let record = Record::from_value(serde_json::json!({"id": "x"})).unwrap();
        assert!(store.upsert_record(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_archive_overwrite_and_not_found() {
        let archive = InMemoryArchiveStore::new();
        archive.put_blob("2024-01-01/r1.json", b"one".to_vec()).await.unwrap();
        archive.put_blob("2024-01-01/r1.json", b"two".to_vec()).await.unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.get_blob("2024-01-01/r1.json").await.unwrap(), b"two");

        let err = archive.get_blob("2024-01-02/r1.json").await.unwrap_err();
        assert!(err.is_not_found_in(StoreKind::Archive));
        assert_eq!(archive.stats(), ArchiveStoreStats { puts: 2, gets: 2 });
    }
}

//! Fallback reader.
//!
//! Reads a billing record from the operational store and, only when that
//! store reports the record as absent, from the archive. Any other failure
//! is returned to the caller as-is.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use coldvault_core::{ArchiveLocation, ColdVaultResult, Record, StoreKind};

use crate::context::JobContext;
use crate::metrics::{FallbackMetrics, FallbackMetricsSnapshot};

/// Which store answered a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    Operational,
    Archive { location: ArchiveLocation },
}

/// A record returned by [`FallbackReader::get_billing_record`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRead {
    pub record: Record,
    pub source: RecordSource,
    /// Exact archived bytes when the record came from the archive.
    pub body: Option<Vec<u8>>,
}

impl RecordRead {
    pub fn is_archived(&self) -> bool {
        matches!(self.source, RecordSource::Archive { .. })
    }

    /// JSON bytes of the record; the archived bytes unchanged when available.
    pub fn to_json_bytes(&self) -> ColdVaultResult<Vec<u8>> {
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => self.record.to_json_bytes(),
        }
    }
}

/// Read-through access to live and archived records.
#[derive(Debug, Clone)]
pub struct FallbackReader {
    context: JobContext,
    metrics: Arc<FallbackMetrics>,
}

impl FallbackReader {
    pub fn new(context: JobContext) -> Self {
        Self {
            context,
            metrics: Arc::new(FallbackMetrics::new()),
        }
    }

    pub fn metrics(&self) -> FallbackMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetch a record by id, which doubles as its partition key.
    ///
    /// # Errors
    ///
    /// A NotFound from the operational store is never returned; it triggers
    /// the archive lookup instead, whose errors (including an archive
    /// NotFound) are returned unchanged.
    pub async fn get_billing_record(&self, record_id: &str) -> ColdVaultResult<RecordRead> {
        let result = self.read(record_id).await;
        let counter = match &result {
            Ok(read) if read.is_archived() => &self.metrics.archive_hits,
            Ok(_) => &self.metrics.operational_hits,
            Err(_) => &self.metrics.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    async fn read(&self, record_id: &str) -> ColdVaultResult<RecordRead> {
        match self.context.operational.read_record(record_id, record_id).await {
            Ok(record) => {
                tracing::debug!(record_id, "Record served from operational store");
                return Ok(RecordRead {
                    record,
                    source: RecordSource::Operational,
                    body: None,
                });
            }
            Err(e) if e.is_not_found_in(StoreKind::Operational) => {
                tracing::info!(record_id, "Record not in operational store, reading archive");
            }
            Err(e) => {
                tracing::error!(error = %e, record_id, "Operational read failed");
                return Err(e);
            }
        }

        let archive = self.context.archive.as_ref();
        let location = self
            .context
            .locator
            .locate(archive, record_id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, record_id, "Archive location unresolved"))?;
        let body = archive
            .get_blob(location.as_str())
            .await
            .inspect_err(|e| {
                tracing::warn!(error = %e, record_id, location = %location, "Archive read failed")
            })?;
        let record = Record::from_slice(&body)?;

        tracing::info!(record_id, location = %location, "Record served from archive");
        Ok(RecordRead {
            record,
            source: RecordSource::Archive { location },
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldvault_storage::{
        ArchiveStore, IdDateLocator, IndexedLocator, InMemoryArchiveStore,
        InMemoryOperationalStore, OperationalStore,
    };

    #[tokio::test]
    async fn test_id_date_locator_reads_without_index() {
        let operational = Arc::new(InMemoryOperationalStore::new());
        let archive = Arc::new(InMemoryArchiveStore::new());
        let body = br#"{"id":"2024-01-01-inv-7","partitionKey":"2024-01-01-inv-7","date":"2024-01-01T09:30:00"}"#;
        archive
            .put_blob("2024-01-01/2024-01-01-inv-7.json", body.to_vec())
            .await
            .unwrap();

        let reader = FallbackReader::new(JobContext::new(
            operational,
            archive,
            Arc::new(IdDateLocator),
        ));
        let read = reader.get_billing_record("2024-01-01-inv-7").await.unwrap();
        assert!(read.is_archived());
        assert_eq!(read.to_json_bytes().unwrap(), body.to_vec());
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_archive_not_found() {
        let reader = FallbackReader::new(JobContext::new(
            Arc::new(InMemoryOperationalStore::new()),
            Arc::new(InMemoryArchiveStore::new()),
            Arc::new(IndexedLocator),
        ));
        let err = reader.get_billing_record("nope").await.unwrap_err();
        assert!(err.is_not_found_in(StoreKind::Archive));
        assert_eq!(reader.metrics().misses, 1);
    }

    #[tokio::test]
    async fn test_operational_hit_counts() {
        let operational = Arc::new(InMemoryOperationalStore::new());
        operational
            .upsert_record(&Record::from_keys("r1", "r1", "2024-05-30T00:00:00"))
            .await
            .unwrap();
        let reader = FallbackReader::new(JobContext::new(
            operational,
            Arc::new(InMemoryArchiveStore::new()),
            Arc::new(IndexedLocator),
        ));
        let read = reader.get_billing_record("r1").await.unwrap();
        assert_eq!(read.source, RecordSource::Operational);
        assert_eq!(read.body, None);
        assert_eq!(reader.metrics().operational_hits, 1);
    }
}

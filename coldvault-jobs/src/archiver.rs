//! Archiver job.
//!
//! One run streams every operational record older than the retention window
//! and, for each record in turn, uploads it to the archive, records its
//! location and deletes it from the operational store. The delete only
//! happens after both archive writes succeeded, so a failure at any step
//! leaves the record live and the next run picks it up again.

use chrono::{DateTime, Duration, Utc};
use coldvault_core::{
    ArchiveLocation, ColdVaultConfig, ColdVaultResult, Record, RecordQuery, StoreKind,
    ValidationError,
};
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::context::JobContext;

/// Outcome of one archiver run.
///
/// `scanned == archived + already_deleted + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveRunReport {
    /// Records with a `date` before this value were selected
    pub cutoff: String,
    pub scanned: u64,
    /// Copied to the archive and deleted by this run
    pub archived: u64,
    /// Copied to the archive, but another run had deleted the original
    pub already_deleted: u64,
    /// Left in the operational store after an error
    pub failed: u64,
}

impl ArchiveRunReport {
    fn new(cutoff: &str) -> Self {
        Self {
            cutoff: cutoff.to_string(),
            ..Self::default()
        }
    }
}

enum ArchiveOutcome {
    Archived,
    AlreadyDeleted,
}

/// Moves records past the retention window from the operational store into
/// the archive.
#[derive(Debug, Clone)]
pub struct Archiver {
    context: JobContext,
    retention: Duration,
}

impl Archiver {
    pub fn new(context: JobContext, retention: Duration) -> Self {
        Self { context, retention }
    }

    pub fn from_config(context: JobContext, config: &ColdVaultConfig) -> Self {
        Self::new(context, config.retention())
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Archive every record older than the retention window as of now.
    pub async fn archive_old_records(&self) -> ColdVaultResult<ArchiveRunReport> {
        self.archive_old_records_at(Utc::now()).await
    }

    /// Archive every record older than the retention window as of `now`.
    ///
    /// Per-record failures are logged and counted. A failing query, or a
    /// retention window reaching past the representable dates, aborts the
    /// run with that error.
    pub async fn archive_old_records_at(&self, now: DateTime<Utc>) -> ColdVaultResult<ArchiveRunReport> {
        let query = RecordQuery::older_than(now, self.retention).inspect_err(|e| {
            tracing::error!(
                error = %e,
                retention_days = self.retention.num_days(),
                "Invalid retention window"
            )
        })?;
        let mut report = ArchiveRunReport::new(query.cutoff());

        tracing::info!(
            cutoff = query.cutoff(),
            operational = self.context.operational.name(),
            archive = self.context.archive.name(),
            "Starting archive run"
        );

        let mut records = self.context.operational.query_records(&query);
        while let Some(next) = records.next().await {
            let record = match next {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        cutoff = query.cutoff(),
                        scanned = report.scanned,
                        "Archive query failed, aborting run"
                    );
                    return Err(e);
                }
            };
            report.scanned += 1;

            match self.archive_record(&record).await {
                Ok(ArchiveOutcome::Archived) => report.archived += 1,
                Ok(ArchiveOutcome::AlreadyDeleted) => report.already_deleted += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        record_id = record.id().unwrap_or("<missing>"),
                        "Failed to archive record"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                cutoff = %report.cutoff,
                scanned = report.scanned,
                archived = report.archived,
                already_deleted = report.already_deleted,
                failed = report.failed,
                "Archive run completed"
            );
        } else {
            tracing::info!(cutoff = %report.cutoff, "Archive run found no records to archive");
        }
        Ok(report)
    }

    async fn archive_record(&self, record: &Record) -> ColdVaultResult<ArchiveOutcome> {
        let id = record.id()?;
        let partition_key = record.partition_key()?;
        let location = ArchiveLocation::for_record(record)?;
        if location.is_reserved() {
            return Err(ValidationError::InvalidValue {
                field: "date".to_string(),
                reason: format!("archive path {} is inside the index namespace", location),
            }
            .into());
        }
        self.context.locator.check_location(id, &location)?;
        let body = record.to_json_bytes()?;

        self.context.archive.put_blob(location.as_str(), body).await?;
        self.context
            .locator
            .record_location(self.context.archive.as_ref(), id, &location)
            .await?;

        match self.context.operational.delete_record(id, partition_key).await {
            Ok(()) => {
                tracing::info!(record_id = id, location = %location, "Archived and deleted record");
                Ok(ArchiveOutcome::Archived)
            }
            Err(e) if e.is_not_found_in(StoreKind::Operational) => {
                tracing::debug!(
                    record_id = id,
                    location = %location,
                    "Record archived but already deleted"
                );
                Ok(ArchiveOutcome::AlreadyDeleted)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coldvault_storage::{IndexedLocator, InMemoryArchiveStore, InMemoryOperationalStore};
    use coldvault_storage::{ArchiveStore, OperationalStore};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_is_a_noop() {
        let operational = Arc::new(InMemoryOperationalStore::new());
        let archive = Arc::new(InMemoryArchiveStore::new());
        let archiver = Archiver::new(
            JobContext::new(operational, archive.clone(), Arc::new(IndexedLocator)),
            Duration::days(90),
        );

        let report = archiver.archive_old_records_at(now()).await.unwrap();
        assert_eq!(report.cutoff, "2024-03-03T12:00:00");
        assert_eq!(report.scanned, 0);
        assert!(archive.is_empty());
    }

    #[tokio::test]
    async fn test_archives_compact_body_and_deletes() {
        let operational = Arc::new(InMemoryOperationalStore::new());
        operational
            .upsert_record(&Record::from_keys("r1", "r1", "2024-01-01T00:00:00"))
            .await
            .unwrap();
        let archive = Arc::new(InMemoryArchiveStore::new());
        let archiver = Archiver::new(
            JobContext::new(operational.clone(), archive.clone(), Arc::new(IndexedLocator)),
            Duration::days(90),
        );

        let report = archiver.archive_old_records_at(now()).await.unwrap();
        assert_eq!(report.archived, 1);
        assert_eq!(
            archive.get_blob("2024-01-01/r1.json").await.unwrap(),
            br#"{"id":"r1","partitionKey":"r1","date":"2024-01-01T00:00:00"}"#.to_vec()
        );
        assert!(operational.is_empty());
    }
}

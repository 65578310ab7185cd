//! In-process counters for the archiver and the fallback reader.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::archiver::ArchiveRunReport;

// ============================================================================
// ARCHIVER
// ============================================================================

/// Counters accumulated over the lifetime of a periodic archive task.
#[derive(Debug, Default)]
pub struct ArchiverMetrics {
    /// Completed runs, successful or not
    pub runs: AtomicU64,
    pub records_scanned: AtomicU64,
    pub records_archived: AtomicU64,
    /// Records already gone from the operational store at delete time
    pub records_already_deleted: AtomicU64,
    /// Records left in place because a step failed
    pub record_failures: AtomicU64,
    /// Runs aborted by a query failure
    pub run_failures: AtomicU64,
}

impl ArchiverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished run into the totals.
    pub fn record_run(&self, report: &ArchiveRunReport) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.records_scanned.fetch_add(report.scanned, Ordering::Relaxed);
        self.records_archived.fetch_add(report.archived, Ordering::Relaxed);
        self.records_already_deleted
            .fetch_add(report.already_deleted, Ordering::Relaxed);
        self.record_failures.fetch_add(report.failed, Ordering::Relaxed);
    }

    pub fn record_run_failure(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.run_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ArchiverMetricsSnapshot {
        ArchiverMetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            records_archived: self.records_archived.load(Ordering::Relaxed),
            records_already_deleted: self.records_already_deleted.load(Ordering::Relaxed),
            record_failures: self.record_failures.load(Ordering::Relaxed),
            run_failures: self.run_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ArchiverMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiverMetricsSnapshot {
    pub runs: u64,
    pub records_scanned: u64,
    pub records_archived: u64,
    pub records_already_deleted: u64,
    pub record_failures: u64,
    pub run_failures: u64,
}

// ============================================================================
// FALLBACK READER
// ============================================================================

/// Where fallback reads were served from.
#[derive(Debug, Default)]
pub struct FallbackMetrics {
    pub operational_hits: AtomicU64,
    pub archive_hits: AtomicU64,
    /// Reads that failed in both stores or with a non-NotFound error
    pub misses: AtomicU64,
}

impl FallbackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FallbackMetricsSnapshot {
        FallbackMetricsSnapshot {
            operational_hits: self.operational_hits.load(Ordering::Relaxed),
            archive_hits: self.archive_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FallbackMetricsSnapshot {
    pub operational_hits: u64,
    pub archive_hits: u64,
    pub misses: u64,
}

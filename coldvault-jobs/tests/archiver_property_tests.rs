//! Property-Based Tests for the Archiver
//!
//! For any mix of records on both sides of the retention cutoff, one run:
//! - uploads every old record to `{date[:10]}/{id}.json` and deletes it
//! - leaves every recent record untouched and unarchived
//!
//! and a second run at the same instant changes nothing.

use std::sync::Arc;

use chrono::Duration;
use coldvault_core::{ColdVaultError, Record};
use coldvault_jobs::{Archiver, JobContext};
use coldvault_storage::{IndexedLocator, OperationalStore};
use coldvault_test_utils::assertions::assert_archived;
use coldvault_test_utils::fixtures::fixed_now;
use coldvault_test_utils::generators::arb_record_split;
use coldvault_test_utils::{InMemoryArchiveStore, InMemoryOperationalStore};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail(e: ColdVaultError) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

fn keys(record: &Record) -> Result<(&str, &str), TestCaseError> {
    Ok((
        record.id().map_err(fail)?,
        record.partition_key().map_err(fail)?,
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_old_records_move_and_recent_records_stay(
        (old, recent) in arb_record_split(fixed_now(), Duration::days(90), 12),
        page_size in 1usize..5,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let operational = Arc::new(InMemoryOperationalStore::with_page_size(page_size));
            for record in old.iter().chain(recent.iter()) {
                operational.upsert_record(record).await.map_err(fail)?;
            }
            let archive = Arc::new(InMemoryArchiveStore::new());
            let archiver = Archiver::new(
                JobContext::new(operational.clone(), archive.clone(), Arc::new(IndexedLocator)),
                Duration::days(90),
            );

            let report = archiver.archive_old_records_at(fixed_now()).await.map_err(fail)?;
            prop_assert_eq!(report.scanned, old.len() as u64);
            prop_assert_eq!(report.archived, old.len() as u64);
            prop_assert_eq!(report.failed, 0);

            for record in &old {
                let (id, partition_key) = keys(record)?;
                assert_archived(&archive, record);
                prop_assert!(!operational.contains(id, partition_key));
                let location = record.archive_location().map_err(fail)?;
                prop_assert_eq!(
                    archive.peek(&format!("_index/{}", id)),
                    Some(location.as_str().as_bytes().to_vec())
                );
            }
            for record in &recent {
                let (id, partition_key) = keys(record)?;
                prop_assert!(operational.contains(id, partition_key));
                let location = record.archive_location().map_err(fail)?;
                prop_assert!(archive.peek(location.as_str()).is_none());
            }
            prop_assert_eq!(archive.len(), old.len() * 2);

            // Second run: nothing left to do
            let puts_before = archive.stats().puts;
            let again = archiver.archive_old_records_at(fixed_now()).await.map_err(fail)?;
            prop_assert_eq!(again.scanned, 0);
            prop_assert_eq!(archive.stats().puts, puts_before);
            prop_assert_eq!(operational.len(), recent.len());

            Ok::<(), TestCaseError>(())
        })?;
    }
}

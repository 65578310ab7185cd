//! COLDVAULT Test Utilities
//!
//! Shared test infrastructure for the COLDVAULT workspace:
//! - Proptest generators for billing records around a retention cutoff
//! - Fault-injecting store wrappers
//! - Test fixtures for common scenarios
//! - Custom assertions for COLDVAULT-specific errors

// Re-export in-memory stores from their source crate
pub use coldvault_storage::{
    ArchiveStoreStats, InMemoryArchiveStore, InMemoryOperationalStore,
};

// Re-export core types for convenience
pub use coldvault_core::{
    ArchiveLocation, ColdVaultError, ColdVaultResult, Record, RecordQuery, StorageError,
    StoreKind, ValidationError,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use coldvault_storage::{ArchiveStore, OperationalStore, RecordStream};
use tokio_stream::StreamExt;

// ============================================================================
// FAULT-INJECTING STORES
// ============================================================================

/// Operational store that misbehaves on request, delegating to an
/// [`InMemoryOperationalStore`] otherwise.
#[derive(Debug)]
pub struct FaultyOperationalStore {
    inner: Arc<InMemoryOperationalStore>,
    injected: Vec<Record>,
    fail_query_after: Option<usize>,
    failing_deletes: HashSet<String>,
    delete_reports_not_found: bool,
    fail_reads: bool,
    reads: AtomicU64,
}

impl FaultyOperationalStore {
    pub fn new(inner: Arc<InMemoryOperationalStore>) -> Self {
        Self {
            inner,
            injected: Vec::new(),
            fail_query_after: None,
            failing_deletes: HashSet::new(),
            delete_reports_not_found: false,
            fail_reads: false,
            reads: AtomicU64::new(0),
        }
    }

    /// Yield `record` from every query before the stored records, even if
    /// the inner store could not hold it (e.g. no `partitionKey`).
    pub fn with_injected_record(mut self, record: Record) -> Self {
        self.injected.push(record);
        self
    }

    /// End every query with an Unavailable error after `n` stored records.
    pub fn failing_query_after(mut self, n: usize) -> Self {
        self.fail_query_after = Some(n);
        self
    }

    /// Deleting `id` fails with Unavailable and leaves the record in place.
    pub fn failing_delete(mut self, id: impl Into<String>) -> Self {
        self.failing_deletes.insert(id.into());
        self
    }

    /// Deletes remove the record but report NotFound, as if an overlapping
    /// run had deleted it first.
    pub fn delete_reports_not_found(mut self) -> Self {
        self.delete_reports_not_found = true;
        self
    }

    /// Point reads fail with Unavailable.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Number of point reads attempted.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

fn injected_failure(store: StoreKind, what: &str) -> ColdVaultError {
    StorageError::unavailable(store, format!("injected {} failure", what)).into()
}

#[async_trait]
impl OperationalStore for FaultyOperationalStore {
    fn name(&self) -> &'static str {
        "faulty-memory"
    }

    fn query_records<'a>(&'a self, query: &'a RecordQuery) -> RecordStream<'a> {
        let injected = self.injected.clone();
        let fail_after = self.fail_query_after;
        let mut inner = self.inner.query_records(query);

        Box::pin(stream! {
            for record in injected {
                let item: ColdVaultResult<Record> = Ok(record);
                yield item;
            }
            let mut passed = 0usize;
            while let Some(item) = inner.next().await {
                if fail_after.is_some_and(|n| passed >= n) {
                    let failure: ColdVaultResult<Record> =
                        Err(injected_failure(StoreKind::Operational, "query"));
                    yield failure;
                    break;
                }
                passed += 1;
                yield item;
            }
        })
    }

    async fn read_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<Record> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads {
            return Err(injected_failure(StoreKind::Operational, "read"));
        }
        self.inner.read_record(id, partition_key).await
    }

    async fn delete_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<()> {
        if self.failing_deletes.contains(id) {
            return Err(injected_failure(StoreKind::Operational, "delete"));
        }
        let result = self.inner.delete_record(id, partition_key).await;
        if self.delete_reports_not_found {
            return Err(StorageError::not_found(StoreKind::Operational, id).into());
        }
        result
    }

    async fn upsert_record(&self, record: &Record) -> ColdVaultResult<()> {
        self.inner.upsert_record(record).await
    }
}

/// Archive store that misbehaves on request, delegating to an
/// [`InMemoryArchiveStore`] otherwise.
#[derive(Debug)]
pub struct FaultyArchiveStore {
    inner: Arc<InMemoryArchiveStore>,
    failing_record_ids: HashSet<String>,
    fail_index_writes: bool,
    fail_gets: bool,
}

impl FaultyArchiveStore {
    pub fn new(inner: Arc<InMemoryArchiveStore>) -> Self {
        Self {
            inner,
            failing_record_ids: HashSet::new(),
            fail_index_writes: false,
            fail_gets: false,
        }
    }

    /// Uploading the record body of `id` fails with Unavailable.
    pub fn failing_upload(mut self, id: impl Into<String>) -> Self {
        self.failing_record_ids.insert(id.into());
        self
    }

    /// Every write under `_index/` fails with Unavailable.
    pub fn failing_index_writes(mut self) -> Self {
        self.fail_index_writes = true;
        self
    }

    /// Every read fails with Unavailable.
    pub fn failing_gets(mut self) -> Self {
        self.fail_gets = true;
        self
    }

    fn rejects_put(&self, path: &str) -> bool {
        if path.starts_with(coldvault_core::constants::ARCHIVE_INDEX_PREFIX) {
            return self.fail_index_writes;
        }
        path.rsplit_once('/')
            .and_then(|(_, file)| file.strip_suffix(coldvault_core::constants::ARCHIVE_BLOB_EXTENSION))
            .is_some_and(|id| self.failing_record_ids.contains(id))
    }
}

#[async_trait]
impl ArchiveStore for FaultyArchiveStore {
    fn name(&self) -> &'static str {
        "faulty-memory"
    }

    async fn put_blob(&self, path: &str, body: Vec<u8>) -> ColdVaultResult<()> {
        if self.rejects_put(path) {
            return Err(injected_failure(StoreKind::Archive, "upload"));
        }
        self.inner.put_blob(path, body).await
    }

    async fn get_blob(&self, path: &str) -> ColdVaultResult<Vec<u8>> {
        if self.fail_gets {
            return Err(injected_failure(StoreKind::Archive, "read"));
        }
        self.inner.get_blob(path).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for billing records relative to a cutoff.

    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Record dates are written without fractional seconds.
    pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Generate a plausible record id.
    pub fn arb_record_id() -> impl Strategy<Value = String> {
        "[a-z]{1,3}-[0-9]{1,6}"
    }

    /// Generate a date string at least one full day older than `retention`
    /// as seen from `now`.
    pub fn arb_old_date(now: DateTime<Utc>, retention: Duration) -> impl Strategy<Value = String> {
        (1i64..2000, 0i64..86_400).prop_map(move |(days, secs)| {
            (now - retention - Duration::days(days) - Duration::seconds(secs))
                .format(RECORD_DATE_FORMAT)
                .to_string()
        })
    }

    /// Generate a date string at least one full day inside the window.
    pub fn arb_recent_date(now: DateTime<Utc>, retention: Duration) -> impl Strategy<Value = String> {
        let max_days = retention.num_days().max(2);
        (0i64..max_days - 1, 0i64..86_400).prop_map(move |(days, secs)| {
            (now - Duration::days(days) - Duration::seconds(secs))
                .format(RECORD_DATE_FORMAT)
                .to_string()
        })
    }

    /// Generate a billing record with the given date strategy.
    pub fn arb_record(date: impl Strategy<Value = String>) -> impl Strategy<Value = Record> {
        (arb_record_id(), date, 1u64..1_000_000, "[A-Z]{3}").prop_map(
            |(id, date, amount_cents, currency)| {
                fixtures::billing_record_with(&id, &date, amount_cents, &currency)
            },
        )
    }

    /// Generate old and recent records with distinct ids.
    ///
    /// Returns `(old, recent)`.
    pub fn arb_record_split(
        now: DateTime<Utc>,
        retention: Duration,
        max_each: usize,
    ) -> impl Strategy<Value = (Vec<Record>, Vec<Record>)> {
        (
            prop::collection::vec(arb_record(arb_old_date(now, retention)), 0..=max_each),
            prop::collection::vec(arb_record(arb_recent_date(now, retention)), 0..=max_each),
        )
            .prop_map(|(old, recent)| {
                let mut by_id: BTreeMap<String, (bool, Record)> = BTreeMap::new();
                for record in old {
                    if let Ok(id) = record.id() {
                        by_id.entry(id.to_string()).or_insert((true, record));
                    }
                }
                for record in recent {
                    if let Ok(id) = record.id() {
                        by_id.entry(id.to_string()).or_insert((false, record));
                    }
                }
                let (old, recent): (Vec<_>, Vec<_>) =
                    by_id.into_values().partition(|(is_old, _)| *is_old);
                (
                    old.into_iter().map(|(_, r)| r).collect(),
                    recent.into_iter().map(|(_, r)| r).collect(),
                )
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Map, Value};

    /// Clock used by scenario tests: 2024-06-01T12:00:00Z.
    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// The minimal `r1` record dated 2024-01-01.
    pub fn scenario_record() -> Record {
        Record::from_keys("r1", "r1", "2024-01-01T00:00:00")
    }

    /// A billing record whose partition key equals its id.
    pub fn billing_record(id: &str, date: &str) -> Record {
        billing_record_with(id, date, 1999, "USD")
    }

    /// A billing record with line items and nested metadata, so that
    /// serialization covers more than flat strings.
    pub fn billing_record_with(id: &str, date: &str, amount_cents: u64, currency: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.to_string()));
        fields.insert("partitionKey".to_string(), Value::String(id.to_string()));
        fields.insert("date".to_string(), Value::String(date.to_string()));
        fields.insert("amountCents".to_string(), json!(amount_cents));
        fields.insert("currency".to_string(), json!(currency));
        fields.insert(
            "lines".to_string(),
            json!([
                {"sku": "storage-gb", "qty": 3, "unit": 0.021},
                {"sku": "egress-gb", "qty": 12, "unit": null}
            ]),
        );
        fields.insert("note".to_string(), json!("caf\u{e9} \u{2603} \"quoted\""));
        Record::new(fields)
    }

    /// Seed an in-memory store with `records`.
    pub async fn seeded_store(records: &[Record]) -> ColdVaultResult<Arc<InMemoryOperationalStore>> {
        let store = Arc::new(InMemoryOperationalStore::new());
        for record in records {
            store.upsert_record(record).await?;
        }
        Ok(store)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for COLDVAULT-specific validation.

    use super::*;

    /// Assert that a result is a NotFound raised by the given store.
    #[track_caller]
    pub fn assert_not_found_in<T: std::fmt::Debug>(result: &ColdVaultResult<T>, store: StoreKind) {
        match result {
            Err(ColdVaultError::Storage(StorageError::NotFound { store: s, .. })) => {
                assert_eq!(*s, store, "Wrong store in NotFound error");
            }
            other => panic!("Expected NotFound from {}, got: {:?}", store, other),
        }
    }

    /// Assert that a result is an Unavailable error.
    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &ColdVaultResult<T>) {
        match result {
            Err(ColdVaultError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable error, got: {:?}", other),
        }
    }

    /// Assert that a result is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &ColdVaultResult<T>) {
        match result {
            Err(ColdVaultError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that `record` is archived byte-for-byte at its location.
    #[track_caller]
    pub fn assert_archived(archive: &InMemoryArchiveStore, record: &Record) {
        let location = match ArchiveLocation::for_record(record) {
            Ok(location) => location,
            Err(e) => panic!("Record has no archive location: {:?}", e),
        };
        let expected = match record.to_json_bytes() {
            Ok(bytes) => bytes,
            Err(e) => panic!("Record does not serialize: {:?}", e),
        };
        match archive.peek(location.as_str()) {
            Some(body) => assert_eq!(
                body,
                expected,
                "Archived body at {} differs from the record",
                location
            ),
            None => panic!("Nothing archived at {}", location),
        }
    }
}

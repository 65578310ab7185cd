//! Constants for COLDVAULT
//!
//! Defaults for configuration plus the fixed pieces of the archive layout.

// ============================================================================
// RECORD FIELDS
// ============================================================================

/// Unique identifier field.
pub const FIELD_ID: &str = "id";

/// Operational store routing key field.
pub const FIELD_PARTITION_KEY: &str = "partitionKey";

/// ISO-8601 timestamp used for retention and archive paths.
pub const FIELD_DATE: &str = "date";

// ============================================================================
// ARCHIVE LAYOUT
// ============================================================================

/// Number of leading characters of `date` used as the archive directory.
pub const DATE_PREFIX_LEN: usize = 10;

/// Extension of archived record blobs.
pub const ARCHIVE_BLOB_EXTENSION: &str = ".json";

/// Namespace for id -> location index entries.
pub const ARCHIVE_INDEX_PREFIX: &str = "_index/";

/// chrono format of the retention cutoff (naive UTC, whole seconds).
pub const CUTOFF_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Cutoff format when the instant has a sub-second part.
pub const CUTOFF_FORMAT_MICROS: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default retention window in days
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Longest accepted retention window (100 years)
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Default interval between archive sweeps (24 hours)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Default page size for lazy operational queries
pub const DEFAULT_QUERY_PAGE_SIZE: usize = 100;

/// Default operational database name
pub const DEFAULT_DATABASE: &str = "billingdb";

/// Default operational container name
pub const DEFAULT_CONTAINER: &str = "records";

/// Default archive container name
pub const DEFAULT_ARCHIVE_CONTAINER: &str = "billing-archive";

/// Default HTTP timeout for remote stores
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default LMDB map size in megabytes
pub const DEFAULT_LMDB_MAX_SIZE_MB: usize = 512;

/// Default LMDB directory
pub const DEFAULT_LMDB_PATH: &str = "./data/operational";

/// Default filesystem archive root
pub const DEFAULT_ARCHIVE_ROOT: &str = "./data/archive";

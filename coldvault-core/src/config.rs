//! Configuration Module
//!
//! Store endpoints, credentials, container names and the retention window
//! are loaded from environment variables with defaults for local runs.
//! Remote backends have required fields; those fail validation when absent.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::constants::{
    DEFAULT_ARCHIVE_CONTAINER, DEFAULT_ARCHIVE_ROOT, DEFAULT_CONTAINER, DEFAULT_DATABASE,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LMDB_MAX_SIZE_MB, DEFAULT_LMDB_PATH,
    DEFAULT_QUERY_PAGE_SIZE, DEFAULT_RETENTION_DAYS, DEFAULT_SWEEP_INTERVAL_SECS,
    MAX_RETENTION_DAYS,
};
use crate::error::{ColdVaultResult, ConfigError};

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// How the fallback reader finds an archived record from its id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorStrategy {
    /// Archiver writes an `_index/{id}` entry; reader follows it.
    #[default]
    Index,
    /// Record ids begin with `YYYY-MM-DD`; the reader derives the path.
    IdDate,
}

impl FromStr for LocatorStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "index" => Ok(LocatorStrategy::Index),
            "id-date" | "id_date" => Ok(LocatorStrategy::IdDate),
            other => Err(invalid("COLDVAULT_LOCATOR", other, "expected index or id-date")),
        }
    }
}

/// Cosmos DB account settings.
#[derive(Debug, Clone)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. `https://acct.documents.azure.com`
    pub endpoint: String,
    /// Base64 master key
    pub key: SecretString,
    pub database: String,
    pub container: String,
}

/// Operational store backend.
#[derive(Debug, Clone)]
pub enum OperationalBackend {
    /// Process-local map; contents are lost on exit.
    Memory,
    /// LMDB environment on local disk.
    Lmdb { path: PathBuf, max_size_mb: usize },
    /// Cosmos DB over its REST API.
    Cosmos(CosmosConfig),
}

/// Azure Blob Storage settings.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Account URL, e.g. `https://acct.blob.core.windows.net`
    pub account_url: String,
    pub container: String,
    /// SAS token granting read/write on the container (without leading `?`)
    pub sas_token: SecretString,
}

/// Archive store backend.
#[derive(Debug, Clone)]
pub enum ArchiveBackend {
    Memory,
    /// Blobs as files under a root directory.
    Filesystem { root: PathBuf },
    AzureBlob(BlobConfig),
}

// ============================================================================
// MASTER CONFIGURATION
// ============================================================================

/// Configuration shared by the archiver, the fallback reader and the binary.
#[derive(Debug, Clone)]
pub struct ColdVaultConfig {
    /// Records older than this many days are archived (default: 90)
    pub retention_days: u32,
    /// Interval between periodic sweeps (default: 24 hours)
    pub sweep_interval: Duration,
    /// Page size for lazy operational queries (default: 100)
    pub query_page_size: usize,
    /// Timeout for remote store requests (default: 30 seconds)
    pub http_timeout: Duration,
    pub locator: LocatorStrategy,
    pub operational: OperationalBackend,
    pub archive: ArchiveBackend,
}

impl Default for ColdVaultConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            query_page_size: DEFAULT_QUERY_PAGE_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            locator: LocatorStrategy::default(),
            operational: OperationalBackend::Memory,
            archive: ArchiveBackend::Memory,
        }
    }
}

impl ColdVaultConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `COLDVAULT_RETENTION_DAYS`: Retention window in days (default: 90)
    /// - `COLDVAULT_SWEEP_INTERVAL_SECS`: Interval between sweeps (default: 86400)
    /// - `COLDVAULT_QUERY_PAGE_SIZE`: Records fetched per query page (default: 100)
    /// - `COLDVAULT_HTTP_TIMEOUT_SECS`: Remote store timeout (default: 30)
    /// - `COLDVAULT_LOCATOR`: `index` or `id-date` (default: index)
    /// - `COLDVAULT_OPERATIONAL_BACKEND`: `memory`, `lmdb` or `cosmos` (default: memory)
    /// - `COLDVAULT_LMDB_PATH`, `COLDVAULT_LMDB_MAX_SIZE_MB`
    /// - `COLDVAULT_COSMOS_ENDPOINT`, `COLDVAULT_COSMOS_KEY`
    /// - `COLDVAULT_DATABASE` (default: billingdb), `COLDVAULT_CONTAINER` (default: records)
    /// - `COLDVAULT_ARCHIVE_BACKEND`: `memory`, `fs` or `azure-blob` (default: memory)
    /// - `COLDVAULT_ARCHIVE_ROOT` (default: ./data/archive)
    /// - `COLDVAULT_BLOB_ACCOUNT_URL`, `COLDVAULT_BLOB_SAS_TOKEN`
    /// - `COLDVAULT_ARCHIVE_CONTAINER` (default: billing-archive)
    pub fn from_env() -> ColdVaultResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ColdVaultConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ColdVaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let retention_days = parse_or(&get, "COLDVAULT_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        let sweep_interval = Duration::from_secs(parse_or(
            &get,
            "COLDVAULT_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?);
        let query_page_size =
            parse_or(&get, "COLDVAULT_QUERY_PAGE_SIZE", DEFAULT_QUERY_PAGE_SIZE)?;
        let http_timeout = Duration::from_secs(parse_or(
            &get,
            "COLDVAULT_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);

        let locator = match get("COLDVAULT_LOCATOR") {
            Some(value) => value.parse()?,
            None => LocatorStrategy::default(),
        };

        let operational = match get("COLDVAULT_OPERATIONAL_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("memory") => OperationalBackend::Memory,
            Some("lmdb") => OperationalBackend::Lmdb {
                path: get("COLDVAULT_LMDB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LMDB_PATH)),
                max_size_mb: parse_or(
                    &get,
                    "COLDVAULT_LMDB_MAX_SIZE_MB",
                    DEFAULT_LMDB_MAX_SIZE_MB,
                )?,
            },
            Some("cosmos") => OperationalBackend::Cosmos(CosmosConfig {
                endpoint: required(&get, "COLDVAULT_COSMOS_ENDPOINT")?,
                key: SecretString::new(required(&get, "COLDVAULT_COSMOS_KEY")?.into()),
                database: get("COLDVAULT_DATABASE")
                    .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                container: get("COLDVAULT_CONTAINER")
                    .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            }),
            Some(other) => {
                return Err(invalid(
                    "COLDVAULT_OPERATIONAL_BACKEND",
                    other,
                    "expected memory, lmdb or cosmos",
                )
                .into())
            }
        };

        let archive = match get("COLDVAULT_ARCHIVE_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("memory") => ArchiveBackend::Memory,
            Some("fs") | Some("filesystem") => ArchiveBackend::Filesystem {
                root: get("COLDVAULT_ARCHIVE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_ROOT)),
            },
            Some("azure-blob") | Some("blob") => ArchiveBackend::AzureBlob(BlobConfig {
                account_url: required(&get, "COLDVAULT_BLOB_ACCOUNT_URL")?,
                container: get("COLDVAULT_ARCHIVE_CONTAINER")
                    .unwrap_or_else(|| DEFAULT_ARCHIVE_CONTAINER.to_string()),
                sas_token: SecretString::new(
                    required(&get, "COLDVAULT_BLOB_SAS_TOKEN")?
                        .trim_start_matches('?')
                        .to_string()
                        .into(),
                ),
            }),
            Some(other) => {
                return Err(invalid(
                    "COLDVAULT_ARCHIVE_BACKEND",
                    other,
                    "expected memory, fs or azure-blob",
                )
                .into())
            }
        };

        let config = Self {
            retention_days,
            sweep_interval,
            query_page_size,
            http_timeout,
            locator,
            operational,
            archive,
        };
        config.validate()?;
        Ok(config)
    }

    /// Retention window as a chrono duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Reject values that would make a sweep meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(invalid(
                "COLDVAULT_RETENTION_DAYS",
                "0",
                "retention must be at least one day",
            ));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(invalid(
                "COLDVAULT_RETENTION_DAYS",
                &self.retention_days.to_string(),
                &format!("retention must not exceed {} days", MAX_RETENTION_DAYS),
            ));
        }
        if self.query_page_size == 0 {
            return Err(invalid(
                "COLDVAULT_QUERY_PAGE_SIZE",
                "0",
                "page size must be positive",
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(invalid(
                "COLDVAULT_SWEEP_INTERVAL_SECS",
                "0",
                "interval must be positive",
            ));
        }
        if let OperationalBackend::Cosmos(cosmos) = &self.operational {
            if !cosmos.endpoint.starts_with("http://") && !cosmos.endpoint.starts_with("https://")
            {
                return Err(invalid(
                    "COLDVAULT_COSMOS_ENDPOINT",
                    &cosmos.endpoint,
                    "must be an http(s) URL",
                ));
            }
        }
        if let ArchiveBackend::AzureBlob(blob) = &self.archive {
            if !blob.account_url.starts_with("http://") && !blob.account_url.starts_with("https://")
            {
                return Err(invalid(
                    "COLDVAULT_BLOB_ACCOUNT_URL",
                    &blob.account_url,
                    "must be an http(s) URL",
                ));
            }
        }
        Ok(())
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(key, &raw, "not a valid number")),
        None => Ok(default),
    }
}

fn required<F>(get: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).ok_or_else(|| ConfigError::MissingRequired {
        field: key.to_string(),
    })
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ColdVaultError;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = ColdVaultConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.retention(), chrono::Duration::days(90));
        assert_eq!(config.sweep_interval, Duration::from_secs(86_400));
        assert_eq!(config.query_page_size, 100);
        assert_eq!(config.locator, LocatorStrategy::Index);
        assert!(matches!(config.operational, OperationalBackend::Memory));
        assert!(matches!(config.archive, ArchiveBackend::Memory));
    }

    #[test]
    fn test_cosmos_and_blob_backends() {
        let config = ColdVaultConfig::from_lookup(lookup(&[
            ("COLDVAULT_OPERATIONAL_BACKEND", "cosmos"),
            ("COLDVAULT_COSMOS_ENDPOINT", "https://acct.documents.azure.com"),
            ("COLDVAULT_COSMOS_KEY", "c2VjcmV0"),
            ("COLDVAULT_ARCHIVE_BACKEND", "azure-blob"),
            ("COLDVAULT_BLOB_ACCOUNT_URL", "https://acct.blob.core.windows.net"),
            ("COLDVAULT_BLOB_SAS_TOKEN", "?sv=2022&sig=abc"),
        ]))
        .unwrap();

        match &config.operational {
            OperationalBackend::Cosmos(cosmos) => {
                assert_eq!(cosmos.database, "billingdb");
                assert_eq!(cosmos.container, "records");
                assert_eq!(cosmos.key.expose_secret(), "c2VjcmV0");
            }
            other => panic!("expected cosmos backend, got {:?}", other),
        }
        match &config.archive {
            ArchiveBackend::AzureBlob(blob) => {
                assert_eq!(blob.container, "billing-archive");
                assert_eq!(blob.sas_token.expose_secret(), "sv=2022&sig=abc");
            }
            other => panic!("expected blob backend, got {:?}", other),
        }
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let config = ColdVaultConfig::from_lookup(lookup(&[
            ("COLDVAULT_OPERATIONAL_BACKEND", "cosmos"),
            ("COLDVAULT_COSMOS_ENDPOINT", "https://acct.documents.azure.com"),
            ("COLDVAULT_COSMOS_KEY", "super-secret-master-key"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("super-secret-master-key"));
    }

    #[test]
    fn test_missing_cosmos_key_is_reported() {
        let err = ColdVaultConfig::from_lookup(lookup(&[
            ("COLDVAULT_OPERATIONAL_BACKEND", "cosmos"),
            ("COLDVAULT_COSMOS_ENDPOINT", "https://acct.documents.azure.com"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ColdVaultError::Config(ConfigError::MissingRequired {
                field: "COLDVAULT_COSMOS_KEY".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_zero_retention_and_bad_numbers() {
        assert!(ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_RETENTION_DAYS", "0")])).is_err());
        assert!(
            ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_RETENTION_DAYS", "ninety")])).is_err()
        );
        assert!(
            ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_QUERY_PAGE_SIZE", "0")])).is_err()
        );
    }

    #[test]
    fn test_rejects_retention_beyond_maximum() {
        let err = ColdVaultConfig::from_lookup(lookup(&[(
            "COLDVAULT_RETENTION_DAYS",
            "1000000000",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ColdVaultError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "COLDVAULT_RETENTION_DAYS"
        ));

        let config =
            ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_RETENTION_DAYS", "36500")])).unwrap();
        assert_eq!(config.retention_days, MAX_RETENTION_DAYS);
    }

    #[test]
    fn test_unknown_backends_and_locators_are_rejected() {
        assert!(ColdVaultConfig::from_lookup(lookup(&[(
            "COLDVAULT_OPERATIONAL_BACKEND",
            "mongo"
        )]))
        .is_err());
        assert!(
            ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_ARCHIVE_BACKEND", "tape")])).is_err()
        );
        assert!(ColdVaultConfig::from_lookup(lookup(&[("COLDVAULT_LOCATOR", "guess")])).is_err());
    }

    #[test]
    fn test_local_backends_and_id_date_locator() {
        let config = ColdVaultConfig::from_lookup(lookup(&[
            ("COLDVAULT_OPERATIONAL_BACKEND", "lmdb"),
            ("COLDVAULT_LMDB_PATH", "/var/lib/coldvault/ops"),
            ("COLDVAULT_ARCHIVE_BACKEND", "fs"),
            ("COLDVAULT_ARCHIVE_ROOT", "/var/lib/coldvault/archive"),
            ("COLDVAULT_LOCATOR", "id-date"),
        ]))
        .unwrap();
        assert_eq!(config.locator, LocatorStrategy::IdDate);
        match config.operational {
            OperationalBackend::Lmdb { path, max_size_mb } => {
                assert_eq!(path, PathBuf::from("/var/lib/coldvault/ops"));
                assert_eq!(max_size_mb, 512);
            }
            other => panic!("expected lmdb backend, got {:?}", other),
        }
        assert!(matches!(
            config.archive,
            ArchiveBackend::Filesystem { ref root } if root == &PathBuf::from("/var/lib/coldvault/archive")
        ));
    }
}

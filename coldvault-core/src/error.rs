//! Error types for COLDVAULT operations

use std::fmt;
use thiserror::Error;

/// Which collaborator an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The low-latency keyed record store.
    Operational,
    /// The path-addressed blob archive.
    Archive,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Operational => f.write_str("operational store"),
            StoreKind::Archive => f.write_str("archive store"),
        }
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Not found in {store}: {key}")]
    NotFound { store: StoreKind, key: String },

    #[error("{store} unavailable: {reason}")]
    Unavailable { store: StoreKind, reason: String },

    #[error("{store} rejected request with status {status}: {reason}")]
    Rejected {
        store: StoreKind,
        status: u16,
        reason: String,
    },

    #[error("Corrupt entry in {store} at {key}: {reason}")]
    Corrupt {
        store: StoreKind,
        key: String,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn not_found(store: StoreKind, key: impl Into<String>) -> Self {
        StorageError::NotFound {
            store,
            key: key.into(),
        }
    }

    pub fn unavailable(store: StoreKind, reason: impl Into<String>) -> Self {
        StorageError::Unavailable {
            store,
            reason: reason.into(),
        }
    }
}

/// Record validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all COLDVAULT errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColdVaultError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ColdVaultError {
    /// True for a NotFound from either store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ColdVaultError::Storage(StorageError::NotFound { .. }))
    }

    /// True for a NotFound raised by the given store.
    pub fn is_not_found_in(&self, kind: StoreKind) -> bool {
        matches!(
            self,
            ColdVaultError::Storage(StorageError::NotFound { store, .. }) if *store == kind
        )
    }
}

impl From<serde_json::Error> for ColdVaultError {
    fn from(e: serde_json::Error) -> Self {
        ColdVaultError::Serialization(e.to_string())
    }
}

/// Result type alias for COLDVAULT operations.
pub type ColdVaultResult<T> = Result<T, ColdVaultError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::not_found(StoreKind::Archive, "2024-01-01/r1.json");
        let msg = format!("{}", err);
        assert!(msg.contains("archive store"));
        assert!(msg.contains("2024-01-01/r1.json"));
    }

    #[test]
    fn test_is_not_found_distinguishes_stores() {
        let err: ColdVaultError = StorageError::not_found(StoreKind::Operational, "r1").into();
        assert!(err.is_not_found());
        assert!(err.is_not_found_in(StoreKind::Operational));
        assert!(!err.is_not_found_in(StoreKind::Archive));
    }

    #[test]
    fn test_unavailable_is_not_not_found() {
        let err: ColdVaultError =
            StorageError::unavailable(StoreKind::Operational, "connection reset").into();
        assert!(!err.is_not_found());
        assert!(format!("{}", err).contains("connection reset"));
    }

    #[test]
    fn test_serde_error_converts_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ColdVaultError = parse_err.into();
        assert!(matches!(err, ColdVaultError::Serialization(_)));
    }
}

//! COLDVAULT Core - Record Types
//!
//! Data types shared by the stores and the jobs: the billing record, its
//! archive location, the retention query, errors and configuration.
//! This crate contains no I/O.

pub mod config;
pub mod constants;
pub mod error;
pub mod location;
pub mod query;
pub mod record;

pub use config::{
    ArchiveBackend, BlobConfig, ColdVaultConfig, CosmosConfig, LocatorStrategy,
    OperationalBackend,
};
pub use error::{
    ColdVaultError, ColdVaultResult, ConfigError, StorageError, StoreKind, ValidationError,
};
pub use location::{date_prefix, index_path, ArchiveLocation};
pub use query::{format_cutoff, ParameterizedQuery, QueryParameter, RecordQuery};
pub use record::Record;

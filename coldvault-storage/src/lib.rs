//! COLDVAULT Storage - Store Traits and Backends
//!
//! Defines the operational and archive store abstractions the jobs depend on,
//! with in-memory, LMDB, filesystem, Cosmos DB and Azure Blob backends, plus
//! the locators that map a record id to its archive location.

pub mod blob;
pub mod cosmos;
pub mod fs;
mod http;
pub mod lmdb;
pub mod locator;
pub mod memory;
pub mod traits;

pub use blob::AzureBlobArchiveStore;
pub use cosmos::CosmosOperationalStore;
pub use fs::FsArchiveStore;
pub use lmdb::{LmdbOperationalStore, LmdbStoreError};
pub use locator::{locator_for, ArchiveLocator, IdDateLocator, IndexedLocator};
pub use memory::{ArchiveStoreStats, InMemoryArchiveStore, InMemoryOperationalStore};
pub use traits::{ArchiveStore, OperationalStore, RecordStream};

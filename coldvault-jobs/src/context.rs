//! Store handles shared by the jobs.

use std::sync::Arc;

use coldvault_core::{ArchiveBackend, ColdVaultConfig, ColdVaultResult, OperationalBackend};
use coldvault_storage::{
    locator_for, ArchiveLocator, ArchiveStore, AzureBlobArchiveStore, CosmosOperationalStore,
    FsArchiveStore, InMemoryArchiveStore, InMemoryOperationalStore, LmdbOperationalStore,
    OperationalStore,
};

/// Explicitly constructed collaborators for one job.
#[derive(Clone)]
pub struct JobContext {
    pub operational: Arc<dyn OperationalStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub locator: Arc<dyn ArchiveLocator>,
}

impl JobContext {
    pub fn new(
        operational: Arc<dyn OperationalStore>,
        archive: Arc<dyn ArchiveStore>,
        locator: Arc<dyn ArchiveLocator>,
    ) -> Self {
        Self {
            operational,
            archive,
            locator,
        }
    }

    /// Open the configured backends.
    pub fn from_config(config: &ColdVaultConfig) -> ColdVaultResult<Self> {
        let operational: Arc<dyn OperationalStore> = match &config.operational {
            OperationalBackend::Memory => Arc::new(InMemoryOperationalStore::with_page_size(
                config.query_page_size,
            )),
            OperationalBackend::Lmdb { path, max_size_mb } => Arc::new(
                LmdbOperationalStore::open(path, *max_size_mb)?
                    .with_page_size(config.query_page_size),
            ),
            OperationalBackend::Cosmos(cosmos) => Arc::new(CosmosOperationalStore::new(
                cosmos,
                config.query_page_size,
                config.http_timeout,
            )?),
        };

        let archive: Arc<dyn ArchiveStore> = match &config.archive {
            ArchiveBackend::Memory => Arc::new(InMemoryArchiveStore::new()),
            ArchiveBackend::Filesystem { root } => Arc::new(FsArchiveStore::new(root)),
            ArchiveBackend::AzureBlob(blob) => {
                Arc::new(AzureBlobArchiveStore::new(blob, config.http_timeout)?)
            }
        };

        let context = Self::new(operational, archive, locator_for(config.locator));
        tracing::info!(
            operational = context.operational.name(),
            archive = context.archive.name(),
            locator = ?context.locator.strategy(),
            "Stores initialized"
        );
        Ok(context)
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("operational", &self.operational.name())
            .field("archive", &self.archive.name())
            .field("locator", &self.locator.strategy())
            .finish()
    }
}

//! Archive locators.
//!
//! The fallback reader only knows a record's id, while the archive location
//! depends on the record's `date`. A locator bridges that gap: the archiver
//! tells it where each record went, and the reader asks it where to look.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use coldvault_core::constants::DATE_PREFIX_LEN;
use coldvault_core::{
    date_prefix, index_path, ArchiveLocation, ColdVaultResult, LocatorStrategy, StorageError,
    StoreKind, ValidationError,
};

use crate::traits::ArchiveStore;

/// Resolves a record id to its archive location.
#[async_trait]
pub trait ArchiveLocator: Send + Sync {
    fn strategy(&self) -> LocatorStrategy;

    /// Called by the archiver before anything is uploaded. An error means
    /// the record could not be found again under `location`, so it is left
    /// in the operational store untouched.
    fn check_location(&self, _id: &str, _location: &ArchiveLocation) -> ColdVaultResult<()> {
        Ok(())
    }

    /// Called by the archiver after the record body was uploaded and before
    /// the operational copy is deleted. An error keeps the record live.
    async fn record_location(
        &self,
        archive: &dyn ArchiveStore,
        id: &str,
        location: &ArchiveLocation,
    ) -> ColdVaultResult<()>;

    /// Where the archived copy of `id` lives.
    async fn locate(&self, archive: &dyn ArchiveStore, id: &str) -> ColdVaultResult<ArchiveLocation>;
}

/// Persists `_index/{id}` entries next to the archived records.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedLocator;

#[async_trait]
impl ArchiveLocator for IndexedLocator {
    fn strategy(&self) -> LocatorStrategy {
        LocatorStrategy::Index
    }

    async fn record_location(
        &self,
        archive: &dyn ArchiveStore,
        id: &str,
        location: &ArchiveLocation,
    ) -> ColdVaultResult<()> {
        archive
            .put_blob(&index_path(id), location.as_str().as_bytes().to_vec())
            .await
    }

    async fn locate(&self, archive: &dyn ArchiveStore, id: &str) -> ColdVaultResult<ArchiveLocation> {
        let path = index_path(id);
        let body = archive.get_blob(&path).await?;
        let location = String::from_utf8(body).map_err(|e| StorageError::Corrupt {
            store: StoreKind::Archive,
            key: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(ArchiveLocation::from_path(location.trim()))
    }
}

/// Derives the location from ids of the form `YYYY-MM-DD...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdDateLocator;

impl IdDateLocator {
    /// The calendar date an id starts with.
    pub fn id_date(id: &str) -> ColdVaultResult<&str> {
        let prefix = date_prefix(id);
        let valid = prefix.len() == DATE_PREFIX_LEN
            && NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok();
        if valid {
            Ok(prefix)
        } else {
            Err(ValidationError::InvalidValue {
                field: "id".to_string(),
                reason: format!("{:?} does not start with a YYYY-MM-DD date", id),
            }
            .into())
        }
    }
}

#[async_trait]
impl ArchiveLocator for IdDateLocator {
    fn strategy(&self) -> LocatorStrategy {
        LocatorStrategy::IdDate
    }

    fn check_location(&self, id: &str, location: &ArchiveLocation) -> ColdVaultResult<()> {
        let id_date = Self::id_date(id)?;
        if id_date != location.date_prefix() {
            return Err(ValidationError::InvalidValue {
                field: "date".to_string(),
                reason: format!(
                    "record {} archived under {} but its id names {}",
                    id,
                    location.date_prefix(),
                    id_date
                ),
            }
            .into());
        }
        Ok(())
    }

    async fn record_location(
        &self,
        _archive: &dyn ArchiveStore,
        id: &str,
        location: &ArchiveLocation,
    ) -> ColdVaultResult<()> {
        self.check_location(id, location)
    }

    async fn locate(&self, _archive: &dyn ArchiveStore, id: &str) -> ColdVaultResult<ArchiveLocation> {
        Ok(ArchiveLocation::new(Self::id_date(id)?, id))
    }
}

/// Locator for the configured strategy.
pub fn locator_for(strategy: LocatorStrategy) -> Arc<dyn ArchiveLocator> {
    match strategy {
        LocatorStrategy::Index => Arc::new(IndexedLocator),
        LocatorStrategy::IdDate => Arc::new(IdDateLocator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryArchiveStore;
    use coldvault_core::ColdVaultError;

    #[tokio::test]
    async fn test_index_round_trip() {
        let archive = InMemoryArchiveStore::new();
        let location = ArchiveLocation::new("2024-01-01T00:00:00", "r1");
        IndexedLocator
            .record_location(&archive, "r1", &location)
            .await
            .unwrap();

        assert_eq!(archive.peek("_index/r1"), Some(b"2024-01-01/r1.json".to_vec()));
        assert_eq!(IndexedLocator.locate(&archive, "r1").await.unwrap(), location);
    }

    #[tokio::test]
    async fn test_index_missing_entry_is_archive_not_found() {
        let archive = InMemoryArchiveStore::new();
        let err = IndexedLocator.locate(&archive, "r1").await.unwrap_err();
        assert!(err.is_not_found_in(StoreKind::Archive));
    }

    #[tokio::test]
    async fn test_index_rejects_non_utf8_entry() {
        let archive = InMemoryArchiveStore::new();
        archive.put_blob("_index/r1", vec![0xff, 0xfe]).await.unwrap();
        let err = IndexedLocator.locate(&archive, "r1").await.unwrap_err();
        assert!(matches!(
            err,
            ColdVaultError::Storage(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_id_date_locate_derives_path() {
        let archive = InMemoryArchiveStore::new();
        let location = IdDateLocator
            .locate(&archive, "2024-01-01-inv-42")
            .await
            .unwrap();
        assert_eq!(location.as_str(), "2024-01-01/2024-01-01-inv-42.json");
        assert_eq!(archive.stats().gets, 0);
    }

    #[tokio::test]
    async fn test_id_date_rejects_ids_without_date() {
        let archive = InMemoryArchiveStore::new();
        for id in ["r1", "2024-13-01-x", "2024-01", "inv-2024-01-01"] {
            let err = IdDateLocator.locate(&archive, id).await.unwrap_err();
            assert!(
                matches!(err, ColdVaultError::Validation(_)),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_id_date_record_location_checks_prefix() {
        let archive = InMemoryArchiveStore::new();
        let id = "2024-01-01-inv-42";

        let matching = ArchiveLocation::new("2024-01-01T08:00:00", id);
        IdDateLocator
            .record_location(&archive, id, &matching)
            .await
            .unwrap();

        let mismatched = ArchiveLocation::new("2023-12-31T23:59:59", id);
        assert!(IdDateLocator
            .record_location(&archive, id, &mismatched)
            .await
            .is_err());
        assert!(archive.is_empty());
    }

    #[test]
    fn test_check_location_before_upload() {
        let id = "2024-01-01-inv-42";
        let matching = ArchiveLocation::new("2024-01-01T08:00:00", id);
        let mismatched = ArchiveLocation::new("2023-12-31T23:59:59", id);

        assert!(IdDateLocator.check_location(id, &matching).is_ok());
        assert!(matches!(
            IdDateLocator.check_location(id, &mismatched),
            Err(ColdVaultError::Validation(ValidationError::InvalidValue { .. }))
        ));
        assert!(IndexedLocator.check_location("r1", &mismatched).is_ok());
    }

    #[test]
    fn test_locator_for_strategy() {
        assert_eq!(locator_for(LocatorStrategy::Index).strategy(), LocatorStrategy::Index);
        assert_eq!(locator_for(LocatorStrategy::IdDate).strategy(), LocatorStrategy::IdDate);
    }
}

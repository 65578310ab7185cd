//! File system archive store.
//!
//! Each blob path maps to a file under the root directory. Writes go to a
//! uniquely named sibling temporary file first and are renamed into place,
//! so a reader never sees a half-written record.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use coldvault_core::{ColdVaultError, ColdVaultResult, StorageError, StoreKind, ValidationError};
use tempfile::NamedTempFile;

use crate::traits::ArchiveStore;

/// Archive store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsArchiveStore {
    root: PathBuf,
}

impl FsArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a blob path onto the root, refusing anything that could escape it.
    fn resolve(&self, path: &str) -> ColdVaultResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = path.is_empty()
            || relative.components().any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(ValidationError::InvalidValue {
                field: "path".to_string(),
                reason: format!("blob path {:?} must be relative and stay inside the archive", path),
            }
            .into());
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, e: std::io::Error) -> ColdVaultError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::not_found(StoreKind::Archive, path).into(),
        _ => StorageError::unavailable(StoreKind::Archive, format!("{}: {}", path, e)).into(),
    }
}

/// Writes never report NotFound: a vanished directory is a store fault.
fn write_error(path: &str, e: std::io::Error) -> ColdVaultError {
    StorageError::unavailable(StoreKind::Archive, format!("{}: {}", path, e)).into()
}

#[async_trait]
impl ArchiveStore for FsArchiveStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn put_blob(&self, path: &str, body: Vec<u8>) -> ColdVaultResult<()> {
        let target = self.resolve(path)?;
        let parent = match target.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.root.clone(),
        };
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| write_error(path, e))?;

        let bytes = body.len();
        let blob = path.to_string();
        tokio::task::spawn_blocking(move || -> ColdVaultResult<()> {
            // Unique sibling per writer, so overlapping runs never share one
            let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| write_error(&blob, e))?;
            tmp.write_all(&body).map_err(|e| write_error(&blob, e))?;
            tmp.persist(&target)
                .map_err(|e| write_error(&blob, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::unavailable(StoreKind::Archive, format!("{}: {}", path, e)))??;

        tracing::trace!(path, bytes, "Wrote archive blob");
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> ColdVaultResult<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target).await.map_err(|e| io_error(path, e))
    }
}

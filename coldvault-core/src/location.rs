//! Archive location derivation.
//!
//! Archived records live at `{date-prefix}/{id}.json`, where the prefix is
//! the first ten characters of the record's `date` (its calendar day). Dates
//! are not validated: a shorter date yields a shorter prefix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ARCHIVE_BLOB_EXTENSION, ARCHIVE_INDEX_PREFIX, DATE_PREFIX_LEN};
use crate::error::ColdVaultResult;
use crate::record::Record;

/// Path of an archived record inside the archive container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveLocation(String);

impl ArchiveLocation {
    /// Build the location from a date string and a record id.
    pub fn new(date: &str, id: &str) -> Self {
        Self(format!(
            "{}/{}{}",
            date_prefix(date),
            id,
            ARCHIVE_BLOB_EXTENSION
        ))
    }

    /// Location for a record, from its `date` and `id` fields.
    pub fn for_record(record: &Record) -> ColdVaultResult<Self> {
        Ok(Self::new(record.date()?, record.id()?))
    }

    /// Wrap a path previously produced by [`ArchiveLocation::as_str`].
    pub fn from_path(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the path lies in the `_index/` namespace, which happens
    /// for records whose `date` starts with `_index`.
    pub fn is_reserved(&self) -> bool {
        self.0.starts_with(ARCHIVE_INDEX_PREFIX)
    }

    /// The directory part (`YYYY-MM-DD` for well-formed dates).
    pub fn date_prefix(&self) -> &str {
        self.0.split_once('/').map(|(prefix, _)| prefix).unwrap_or("")
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchiveLocation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// First [`DATE_PREFIX_LEN`] characters of `date` (fewer if it is shorter).
pub fn date_prefix(date: &str) -> &str {
    match date.char_indices().nth(DATE_PREFIX_LEN) {
        Some((end, _)) => &date[..end],
        None => date,
    }
}

/// Archive path of the index entry that maps `id` to its location.
pub fn index_path(id: &str) -> String {
    format!("{}{}", ARCHIVE_INDEX_PREFIX, id)
}

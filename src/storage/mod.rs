//! Persistence of uploaded parts and the metadata describing them.

use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;

/// Disk-backed persistence engine.
pub mod disk;
pub use disk::DiskStorage;

/// Metadata for one persisted file, including its internal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Declared content type of the part.
    pub mime_type: String,
    /// Extension derived from `mime_type`, when one is known.
    pub extension: Option<String>,
    /// Final on-disk file name.
    pub name: String,
    /// Full destination path. Never sent to clients.
    pub path: PathBuf,
}

impl FileRecord {
    /// Returns the client-facing view without the path.
    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            mime_type: self.mime_type.clone(),
            name: self.name.clone(),
            extension: self.extension.clone(),
        }
    }
}

/// Client-facing file metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Declared content type of the part.
    pub mime_type: String,
    /// Final on-disk file name.
    pub name: String,
    /// Extension derived from `mime_type`; omitted when the type is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// Result of the save stage.
///
/// A single-part request yields one record, never a one-entry map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The request carried exactly one part.
    Single(FileRecord),
    /// The request carried several parts, keyed by field name.
    Multiple(BTreeMap<String, FileRecord>),
}

impl SaveOutcome {
    /// Iterates over every persisted record.
    pub fn records(&self) -> Box<dyn Iterator<Item = &FileRecord> + '_> {
        match self {
            Self::Single(record) => Box::new(std::iter::once(record)),
            Self::Multiple(records) => Box::new(records.values()),
        }
    }

    /// Returns the client-facing view with every path removed.
    pub fn metadata(&self) -> UploadedFiles {
        match self {
            Self::Single(record) => UploadedFiles::Single(record.metadata()),
            Self::Multiple(records) => UploadedFiles::Multiple(
                records
                    .iter()
                    .map(|(field, record)| (field.clone(), record.metadata()))
                    .collect(),
            ),
        }
    }
}

/// Client-facing form of [`SaveOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UploadedFiles {
    /// One file.
    Single(FileMetadata),
    /// Several files keyed by field name.
    Multiple(BTreeMap<String, FileMetadata>),
}

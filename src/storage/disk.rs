//! Streams parts into files under a local storage root.
//!
//! Known limitations: the destination is `root/final_name` with no traversal
//! guard, two requests resolving to the same name race on the same path, and
//! a failed write leaves whatever was already written on disk. Sibling files
//! of a failed multi-part save are not rolled back either.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use futures::{future, StreamExt};
use percent_encoding::percent_decode_str;
use tokio::io::AsyncWriteExt;

use super::{FileRecord, SaveOutcome};
use crate::{error::StorageError, mime_table, part::UploadedPart};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Disk-backed persistence engine writing files under a configured root.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a storage engine rooted at `root`.
    ///
    /// The root is expected to exist and be writable; `UploaderBuilder`
    /// checks this at registration time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves every part of a payload.
    ///
    /// One part is saved directly and returned as [`SaveOutcome::Single`].
    /// Several parts are saved concurrently; the call returns once all of them
    /// have finished, failing with the first error in field order when any
    /// save failed. Parts missing from `names` fall back to their lossily
    /// decoded declared filename.
    pub async fn save(
        &self,
        payload: BTreeMap<String, UploadedPart>,
        names: &BTreeMap<String, String>,
    ) -> Result<SaveOutcome, StorageError> {
        let mut entries: Vec<(String, UploadedPart, String)> = payload
            .into_iter()
            .map(|(field, part)| {
                let name = names
                    .get(&field)
                    .cloned()
                    .unwrap_or_else(|| fallback_name(&part));
                (field, part, name)
            })
            .collect();

        match entries.len() {
            0 => Err(StorageError::NoFiles),
            1 => {
                let (field, part, name) = entries.remove(0);
                self.save_part(&field, part, &name)
                    .await
                    .map(SaveOutcome::Single)
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::debug!(parts = entries.len(), "disk storage: saving parts concurrently");

                let saves = entries.into_iter().map(|(field, part, name)| async move {
                    let result = self.save_part(&field, part, &name).await;
                    (field, result)
                });

                let mut records = BTreeMap::new();
                let mut first_error = None;
                for (field, result) in future::join_all(saves).await {
                    match result {
                        Ok(record) => {
                            records.insert(field, record);
                        }
                        Err(err) => {
                            first_error.get_or_insert(err);
                        }
                    }
                }

                match first_error {
                    Some(err) => Err(err),
                    None => Ok(SaveOutcome::Multiple(records)),
                }
            }
        }
    }

    /// Streams one part to `root/final_name`.
    ///
    /// The destination file handle is dropped, and therefore closed, on every
    /// return path.
    pub async fn save_part(
        &self,
        field: &str,
        mut part: UploadedPart,
        final_name: &str,
    ) -> Result<FileRecord, StorageError> {
        let mime_type = part
            .content_type()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_owned();
        let path = self.root.join(final_name);

        let mut stream = part.take_stream().ok_or_else(|| StorageError::StreamConsumed {
            field: field.to_owned(),
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            field = field,
            name = final_name,
            content_type = mime_type.as_str(),
            path = %path.display(),
            "disk storage: begin streaming save"
        );

        let mut file = tokio::fs::File::create(&path).await.map_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::error!(field = field, error = %err, "error while saving file, possible issue with path");
            StorageError::Open {
                field: field.to_owned(),
                message: err.to_string(),
            }
        })?;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::error!(field = field, error = %err, "error while reading upload stream");
                StorageError::Source {
                    field: field.to_owned(),
                    message: err.to_string(),
                }
            })?;
            file.write_all(&bytes).await.map_err(|err| write_error(field, &err))?;
        }

        file.flush().await.map_err(|err| write_error(field, &err))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(field = field, name = final_name, "disk storage: completed save");

        Ok(FileRecord {
            extension: mime_table::extension_for_mime(&mime_type),
            mime_type,
            name: final_name.to_owned(),
            path,
        })
    }
}

fn write_error(field: &str, err: &std::io::Error) -> StorageError {
    #[cfg(feature = "tracing")]
    tracing::error!(field = field, error = %err, "error while saving file");
    StorageError::Write {
        field: field.to_owned(),
        message: err.to_string(),
    }
}

fn fallback_name(part: &UploadedPart) -> String {
    let declared = part.filename().unwrap_or_default();
    percent_decode_str(declared).decode_utf8_lossy().into_owned()
}

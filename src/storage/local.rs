//! Managed storage over a local directory

use super::{FileHandle, ManagedStorage, StorageEntry, StorageWriter};
use crate::error::{Error, Result};
use crate::types::DirectoryRef;
use crate::utils::{GENERIC_MIME, get_unique_path, mime_for_name};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// [`ManagedStorage`] backed by the local filesystem
///
/// A [`DirectoryRef`] is a directory path and entry ids are file paths. Only
/// regular files are listed. MIME types are guessed from file extensions and
/// unknown ones report `application/octet-stream`, like a document provider that
/// cannot tell.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    /// Create a local storage provider
    pub fn new() -> Self {
        Self
    }

    fn dir_path(dir: &DirectoryRef) -> PathBuf {
        PathBuf::from(dir.as_str())
    }
}

#[async_trait]
impl ManagedStorage for LocalStorage {
    async fn enumerate(&self, dir: &DirectoryRef) -> Result<Vec<StorageEntry>> {
        let mut read_dir = tokio::fs::read_dir(Self::dir_path(dir)).await.map_err(|e| {
            Error::Storage(format!("failed to list directory '{}': {}", dir, e))
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let display_name = entry.file_name().to_string_lossy().into_owned();
            let mime_type = mime_for_name(&display_name).unwrap_or(GENERIC_MIME);
            entries.push(StorageEntry {
                id: entry.path().to_string_lossy().into_owned(),
                mime_type: Some(mime_type.to_string()),
                display_name,
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        Ok(entries)
    }

    async fn create_file(
        &self,
        dir: &DirectoryRef,
        _mime_type: &str,
        name: &str,
    ) -> Result<FileHandle> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::Storage(format!("invalid file name '{}'", name)));
        }

        let dir_path = Self::dir_path(dir);
        tokio::fs::create_dir_all(&dir_path).await.map_err(|e| {
            Error::Storage(format!("failed to create directory '{}': {}", dir, e))
        })?;

        let path = get_unique_path(&dir_path.join(name))?;
        tokio::fs::File::create(&path).await.map_err(|e| {
            Error::Storage(format!("failed to create '{}': {}", path.display(), e))
        })?;

        let final_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        tracing::debug!(path = %path.display(), "Created library entry");

        Ok(FileHandle {
            id: path.to_string_lossy().into_owned(),
            name: final_name,
        })
    }

    async fn open_write(&self, handle: &FileHandle) -> Result<StorageWriter> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(Path::new(&handle.id))
            .await
            .map_err(|e| Error::Storage(format!("failed to open '{}': {}", handle.id, e)))?;
        Ok(Box::new(file))
    }

    async fn delete(&self, handle: &FileHandle) -> Result<bool> {
        match tokio::fs::remove_file(Path::new(&handle.id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage(format!(
                "failed to delete '{}': {}",
                handle.id, e
            ))),
        }
    }
}

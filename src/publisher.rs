//! StagingPublisher: move staged tracks into the managed library

use crate::error::{Error, Result};
use crate::storage::{FileHandle, ManagedStorage};
use crate::transfer::StagedFile;
use crate::types::DirectoryRef;
use crate::utils::{GENERIC_MIME, mime_for_name};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Copies staged files into managed storage and clears staging
#[derive(Clone)]
pub struct StagingPublisher {
    storage: Arc<dyn ManagedStorage>,
}

impl StagingPublisher {
    /// Create a publisher targeting `storage`
    pub fn new(storage: Arc<dyn ManagedStorage>) -> Self {
        Self { storage }
    }

    /// Publish `staged` into `dir` as `<title>.<ext>`
    ///
    /// The staging file is removed whether or not publishing succeeds. If the
    /// copy fails after the library entry was created, the partial entry is
    /// deleted on a best-effort basis.
    pub async fn publish(&self, staged: &StagedFile, dir: &DirectoryRef) -> Result<FileHandle> {
        let result = self.copy_into_library(staged, dir).await;
        self.discard(staged).await;

        match &result {
            Ok(handle) => {
                tracing::info!(title = %staged.title, name = %handle.name, "Published track")
            }
            Err(e) => tracing::error!(title = %staged.title, error = %e, "Failed to publish track"),
        }
        result
    }

    /// Remove a staged file that will not be published
    pub async fn discard(&self, staged: &StagedFile) {
        match tokio::fs::remove_file(&staged.path).await {
            Ok(()) => tracing::debug!(path = %staged.path.display(), "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %staged.path.display(),
                    error = %e,
                    "Failed to remove staged file"
                )
            }
        }
    }

    async fn copy_into_library(
        &self,
        staged: &StagedFile,
        dir: &DirectoryRef,
    ) -> Result<FileHandle> {
        let name = staged.file_name();
        let mime_type = mime_for_name(&name).unwrap_or(GENERIC_MIME);
        let handle = self.storage.create_file(dir, mime_type, &name).await?;

        if let Err(e) = self.write_entry(staged, &handle).await {
            match self.storage.delete(&handle).await {
                Ok(_) => tracing::debug!(name = %handle.name, "Deleted partial library entry"),
                Err(delete_err) => tracing::warn!(
                    name = %handle.name,
                    error = %delete_err,
                    "Failed to delete partial library entry"
                ),
            }
            return Err(e);
        }
        Ok(handle)
    }

    async fn write_entry(&self, staged: &StagedFile, handle: &FileHandle) -> Result<()> {
        let mut source = tokio::fs::File::open(&staged.path).await.map_err(|e| {
            Error::Storage(format!(
                "failed to open staged file '{}': {}",
                staged.path.display(),
                e
            ))
        })?;
        let mut writer = self.storage.open_write(handle).await?;
        tokio::io::copy(&mut source, &mut writer).await?;
        writer.flush().await?;
        writer.shutdown().await?;
        Ok(())
    }
}

//! Managed storage provider
//!
//! The library lives behind a provider the engine does not own: it can list a
//! directory, create a named entry of a given MIME type, open it for writing and
//! delete it. [`LocalStorage`] implements this over a plain directory; hosts with
//! a document-tree style API supply their own [`ManagedStorage`].

mod local;

pub use local::LocalStorage;

use crate::types::DirectoryRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

/// One entry returned by [`ManagedStorage::enumerate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Provider-specific identifier
    pub id: String,
    /// MIME type as the provider reports it, if any
    pub mime_type: Option<String>,
    /// File name shown to users, extension included
    pub display_name: String,
    /// Last modification time, if known
    pub last_modified: Option<DateTime<Utc>>,
}

/// A created entry that can be written to or deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Provider-specific identifier
    pub id: String,
    /// Final name the provider gave the entry (may differ from the requested one)
    pub name: String,
}

/// Writer returned by [`ManagedStorage::open_write`]
pub type StorageWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Trait for the provider that owns the audio library
#[async_trait]
pub trait ManagedStorage: Send + Sync {
    /// List the entries of a directory
    async fn enumerate(&self, dir: &DirectoryRef) -> crate::Result<Vec<StorageEntry>>;

    /// Create an empty entry named `name` in `dir`
    ///
    /// Providers may rename on collision; the returned handle carries the final name.
    async fn create_file(
        &self,
        dir: &DirectoryRef,
        mime_type: &str,
        name: &str,
    ) -> crate::Result<FileHandle>;

    /// Open an entry for writing from the start
    async fn open_write(&self, handle: &FileHandle) -> crate::Result<StorageWriter>;

    /// Delete an entry; `Ok(false)` when it was already gone
    async fn delete(&self, handle: &FileHandle) -> crate::Result<bool>;
}

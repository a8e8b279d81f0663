//! What the managed library already holds

use crate::error::Result;
use crate::storage::{ManagedStorage, StorageEntry};
use crate::types::DirectoryRef;
use crate::utils::{GENERIC_MIME, is_audio_mime, mime_for_name, strip_extension};
use std::collections::HashSet;

/// Titles of the audio entries in the library, captured once per playlist job
///
/// Never mutated after capture: tracks published while the playlist runs are
/// not added, so membership reflects the library as it was when the job
/// started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySnapshot {
    titles: HashSet<String>,
}

impl LibrarySnapshot {
    /// Enumerate `dir` once and collect the stems of every audio entry
    pub async fn capture(storage: &dyn ManagedStorage, dir: &DirectoryRef) -> Result<Self> {
        let entries = storage.enumerate(dir).await?;
        let titles: HashSet<String> = entries
            .iter()
            .filter(|entry| is_audio_entry(entry))
            .map(|entry| strip_extension(&entry.display_name).to_string())
            .collect();

        tracing::debug!(
            dir = %dir,
            entries = entries.len(),
            audio = titles.len(),
            "Captured library snapshot"
        );
        Ok(Self { titles })
    }

    /// Whether a sanitized title was present at capture time
    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    /// Number of audio titles captured
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Whether the library held no audio at capture time
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl FromIterator<String> for LibrarySnapshot {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            titles: iter.into_iter().collect(),
        }
    }
}

// Trust a specific MIME type; fall back to the extension when the provider
// reports none or a generic one
fn is_audio_entry(entry: &StorageEntry) -> bool {
    match entry.mime_type.as_deref() {
        Some(mime) if mime != GENERIC_MIME && !mime.is_empty() => is_audio_mime(mime),
        _ => mime_for_name(&entry.display_name).is_some_and(is_audio_mime),
    }
}

/// Find an entry of any type whose name without extension matches `title`
///
/// The match is case-insensitive. Used for the single-item path, which checks
/// one title instead of capturing a snapshot.
pub async fn find_existing(
    storage: &dyn ManagedStorage,
    dir: &DirectoryRef,
    title: &str,
) -> Result<Option<StorageEntry>> {
    let wanted = title.to_lowercase();
    let found = storage
        .enumerate(dir)
        .await?
        .into_iter()
        .find(|entry| strip_extension(&entry.display_name).to_lowercase() == wanted);
    Ok(found)
}

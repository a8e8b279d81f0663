//! Core types and events for audio-dl

use crate::request::RequestKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a job within one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a directory owned by a managed storage provider
///
/// For [`LocalStorage`](crate::storage::LocalStorage) this is a filesystem path;
/// other providers may use document-tree URIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryRef(String);

impl DirectoryRef {
    /// Wrap a provider-specific directory identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirectoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A URL submitted by the user, consumed once by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Media or playlist URL
    pub url: String,
}

impl DownloadRequest {
    /// Create a request for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Single item or playlist, derived from the URL shape
    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(&self.url)
    }
}

/// Metadata resolved for one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Title as reported by the source (sanitized for playlist entries)
    pub title: String,
    /// URL the track itself is downloaded from
    pub source_url: String,
    /// Uploader or artist, when known
    pub uploader: Option<String>,
}

/// Job lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, nothing run yet
    Idle,
    /// Deciding between single-item and playlist handling
    Classifying,
    /// Resolving metadata through the extraction tool
    FetchingMetadata,
    /// Transferring a track into staging
    Downloading,
    /// Moving a staged track into the library
    Publishing,
    /// Finished (playlist item failures do not prevent this)
    Completed,
    /// Finished with a job-level error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl JobState {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// The single in-flight job owned by an orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Job ID
    pub id: JobId,
    /// Requested URL
    pub url: String,
    /// Single item or playlist
    pub kind: RequestKind,
    /// Current state
    pub state: JobState,
    /// Index of the playlist item being processed (0-based)
    pub current_index: usize,
    /// Number of playlist items to process (None for single items)
    pub total_items: Option<usize>,
    /// Most recent error message, if any
    pub last_error: Option<String>,
}

impl DownloadJob {
    pub(crate) fn new(id: JobId, request: &DownloadRequest) -> Self {
        Self {
            id,
            url: request.url.clone(),
            kind: request.kind(),
            state: JobState::Idle,
            current_index: 0,
            total_items: None,
            last_error: None,
        }
    }
}

/// Progress update delivered to the progress sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completion of the current step, 0 to 100
    pub percent: u8,
    /// Headline (track title or phase name)
    pub title: String,
    /// Detail line (attempt counter, ETA, error text)
    pub detail: String,
}

impl ProgressEvent {
    /// Create a progress event, clamping `percent` to 100
    pub fn new(percent: u8, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Where phases report their progress text
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Counts reported when a job completes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Tracks published into the library
    pub published: usize,
    /// Playlist entries skipped because the library already had them
    pub skipped: usize,
    /// Playlist items that failed and were logged
    pub failed: usize,
}

/// Final outcome of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job ran to completion
    Completed {
        /// What was published, skipped and failed
        summary: JobSummary,
    },
    /// The job failed as a whole
    Failed {
        /// User-facing summary message
        error: String,
    },
    /// The job was cancelled
    Cancelled,
}

/// Event emitted during a job's lifecycle
///
/// For every accepted job, exactly one of `Completed`, `Failed` or `Cancelled`
/// is emitted, followed by exactly one `Shutdown`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress text and percentage for the current step
    Progress {
        /// Job ID
        job_id: JobId,
        /// Progress event payload
        #[serde(flatten)]
        progress: ProgressEvent,
    },

    /// The job moved to a new state
    StateChanged {
        /// Job ID
        job_id: JobId,
        /// New state
        state: JobState,
    },

    /// One track landed in the library
    ItemPublished {
        /// Job ID
        job_id: JobId,
        /// Sanitized title of the track
        title: String,
    },

    /// One playlist item failed; the batch continues
    ItemFailed {
        /// Job ID
        job_id: JobId,
        /// Sanitized title of the track
        title: String,
        /// Error message
        error: String,
    },

    /// Job finished
    Completed {
        /// Job ID
        job_id: JobId,
        /// Counts for the job
        summary: JobSummary,
    },

    /// Job failed
    Failed {
        /// Job ID
        job_id: JobId,
        /// User-facing error message
        error: String,
    },

    /// Job was cancelled
    Cancelled {
        /// Job ID
        job_id: JobId,
    },

    /// Host may release resources held for this job
    Shutdown {
        /// Job ID
        job_id: JobId,
    },
}

impl Event {
    /// The job this event belongs to
    pub fn job_id(&self) -> JobId {
        match self {
            Event::Progress { job_id, .. }
            | Event::StateChanged { job_id, .. }
            | Event::ItemPublished { job_id, .. }
            | Event::ItemFailed { job_id, .. }
            | Event::Completed { job_id, .. }
            | Event::Failed { job_id, .. }
            | Event::Cancelled { job_id }
            | Event::Shutdown { job_id } => *job_id,
        }
    }
}

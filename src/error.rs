//! Error types for audio-dl
//!
//! This module provides the error taxonomy used across the engine:
//! - Precondition errors, rejected before any job starts and never retried
//! - Terminal errors recognized from the extraction tool's output
//! - Phase failures after the retry budget is spent
//! - Cancellation, kept apart from failure so hosts never report it as an error

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for audio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for audio-dl
#[derive(Debug, Error)]
pub enum Error {
    /// A submission was rejected before a job was created
    #[error("request rejected: {0}")]
    Precondition(#[from] PreconditionError),

    /// The extraction tool reported a failure that no retry can fix
    #[error("{0}")]
    Terminal(TerminalReason),

    /// A phase kept failing until its retry budget ran out
    #[error("{phase} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Phase whose budget was exhausted
        phase: Phase,
        /// Number of attempts made
        attempts: u32,
        /// Message of the final attempt's failure
        last_error: String,
    },

    /// A track with the same sanitized title is already in the library
    #[error("file already exists: {title}")]
    AlreadyExists {
        /// Sanitized title that matched an existing library entry
        title: String,
    },

    /// Flat playlist output did not contain an entry list
    #[error("malformed playlist listing: {0}")]
    MalformedPlaylist(String),

    /// Metadata was present but unusable (for example an empty title)
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The extraction tool reported success but the staged file is not there
    #[error("staged output missing at {}", path.display())]
    MissingOutput {
        /// Where the staged file was expected
        path: PathBuf,
    },

    /// Managed storage provider failure
    #[error("storage error: {0}")]
    Storage(String),

    /// External tool execution failed
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "staging_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The job was cancelled
    #[error("cancelled")]
    Cancelled,
}

/// Reasons a submission is refused before a job exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// No wifi, cellular or ethernet transport is up
    #[error("no network connection")]
    NoNetwork,

    /// Another job is already running on this orchestrator
    #[error("a download is already in progress")]
    JobActive,

    /// The managed library directory has not been chosen
    #[error("audio directory is not set")]
    LibraryNotConfigured,

    /// The orchestrator is shutting down
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,
}

/// Failures recognized from the extraction tool's messages that are never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The URL was rejected by the tool
    InvalidUrl,
    /// The media has been removed or blocked
    VideoUnavailable,
    /// The media is private
    PrivateVideo,
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            TerminalReason::InvalidUrl => "Not a valid URL.",
            TerminalReason::VideoUnavailable => "Video is unavailable.",
            TerminalReason::PrivateVideo => "Video is private.",
        };
        f.write_str(message)
    }
}

/// Retried phases, used to label exhausted budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Single-item info fetch
    FetchInfo,
    /// Flat playlist listing
    FetchPlaylist,
    /// Audio transfer into staging
    Download,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::FetchInfo => "Video info",
            Phase::FetchPlaylist => "Playlist info",
            Phase::Download => "Download",
        };
        f.write_str(label)
    }
}

impl Error {
    /// Message suitable for the single per-job summary shown to users
    pub fn user_message(&self) -> String {
        match self {
            Error::Precondition(e) => capitalize(&e.to_string()),
            Error::Terminal(reason) => reason.to_string(),
            Error::AlreadyExists { .. } => "File already exists.".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error represents cancellation rather than failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}

//! Traits and types for the external extraction tool

use super::request::ExtractRequest;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Info-only result for one media item
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VideoInfo {
    /// Tool-side identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Uploader or artist
    #[serde(default)]
    pub uploader: Option<String>,
    /// Canonical page URL
    #[serde(default)]
    pub webpage_url: Option<String>,
}

/// One progress tick from a running transfer
#[derive(Debug, Clone, PartialEq)]
pub struct ToolProgress {
    /// Percent complete as reported by the tool
    pub percent: f32,
    /// Seconds remaining, or -1 when the tool does not know yet
    pub eta_seconds: i64,
    /// The raw output line
    pub line: String,
}

/// Receives progress ticks while [`MediaExtractor::execute`] runs
pub type ProgressCallback = Arc<dyn Fn(ToolProgress) + Send + Sync>;

/// Captured output of a finished tool run
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct ExecuteOutput {
    /// Standard output, minus progress lines
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Trait for the external extraction capability
///
/// Implementations run a tool such as `yt-dlp` or provide stub behavior when
/// none is available. A failed run reports the tool's own message in the error
/// so that the retry layer can recognize permanent failures.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve metadata for the request without downloading anything
    ///
    /// # Errors
    ///
    /// Returns an error if the tool fails, exits non-zero, or prints output
    /// that cannot be parsed.
    async fn get_info(&self, request: &ExtractRequest) -> crate::Result<VideoInfo>;

    /// Run the request to completion
    ///
    /// When `process_id` is set the run can be interrupted through
    /// [`cancel`](Self::cancel), in which case this returns
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started, exits non-zero, or is
    /// cancelled.
    async fn execute(
        &self,
        request: &ExtractRequest,
        process_id: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> crate::Result<ExecuteOutput>;

    /// Interrupt the run registered under `process_id`
    ///
    /// Returns `true` if a run was found and signalled.
    async fn cancel(&self, process_id: &str) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

//! Stub extractor for hosts without yt-dlp

use super::request::ExtractRequest;
use super::traits::{ExecuteOutput, MediaExtractor, ProgressCallback, VideoInfo};
use async_trait::async_trait;

/// Extractor used when no yt-dlp binary is configured or found
///
/// Every operation returns `Error::NotSupported`, which is never retried, so a
/// submitted job fails once with a clear message instead of spinning through
/// its retry budget.
///
/// # Examples
///
/// ```
/// use audio_dl::extractor::{ExtractRequest, MediaExtractor, UnavailableExtractor};
///
/// # #[tokio::main]
/// # async fn main() {
/// let extractor = UnavailableExtractor;
/// let result = extractor.get_info(&ExtractRequest::new("https://youtu.be/abc")).await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct UnavailableExtractor;

const UNAVAILABLE: &str =
    "media extraction requires the yt-dlp binary. Configure ytdlp_path or ensure yt-dlp is in PATH.";

#[async_trait]
impl MediaExtractor for UnavailableExtractor {
    async fn get_info(&self, _request: &ExtractRequest) -> crate::Result<VideoInfo> {
        Err(crate::Error::NotSupported(UNAVAILABLE.into()))
    }

    async fn execute(
        &self,
        _request: &ExtractRequest,
        _process_id: Option<&str>,
        _progress: Option<ProgressCallback>,
    ) -> crate::Result<ExecuteOutput> {
        Err(crate::Error::NotSupported(UNAVAILABLE.into()))
    }

    async fn cancel(&self, _process_id: &str) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

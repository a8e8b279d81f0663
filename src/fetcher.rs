//! MetadataFetcher: turn a URL into one track or a playlist's worth of tracks

use crate::config::RetryConfig;
use crate::error::{Phase, Result};
use crate::extractor::{ExtractRequest, MediaExtractor, parse_flat_playlist};
use crate::retry::{RetryEvent, cancellable, run_with_retry};
use crate::types::{ProgressEvent, ProgressSink, TrackMetadata};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FETCH_ERROR_TITLE: &str = "Unexpected Error on Fetch";

/// Resolves metadata through the extraction tool under the fetch retry policies
#[derive(Clone)]
pub struct MetadataFetcher {
    extractor: Arc<dyn MediaExtractor>,
    retry: RetryConfig,
}

impl MetadataFetcher {
    /// Create a fetcher using `retry.fetch_single` and `retry.fetch_playlist`
    pub fn new(extractor: Arc<dyn MediaExtractor>, retry: RetryConfig) -> Self {
        Self { extractor, retry }
    }

    /// Fetch info for a single item, with playlist expansion disabled
    ///
    /// The returned title is exactly what the source reports; callers sanitize
    /// it. The source URL is the requested one.
    pub async fn fetch_single(
        &self,
        url: &str,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<TrackMetadata> {
        let request = ExtractRequest::new(url).option("--no-playlist");

        let info = run_with_retry(
            &self.retry.fetch_single,
            Phase::FetchInfo,
            cancel,
            |event| report_fetch(progress, "Fetching Info.", event),
            |_| cancellable(cancel, self.extractor.get_info(&request)),
        )
        .await?;

        Ok(TrackMetadata {
            title: info.title.unwrap_or_default(),
            source_url: url.to_string(),
            uploader: info.uploader,
        })
    }

    /// Fetch a playlist as a flat listing
    ///
    /// Entries come back in listing order with sanitized titles; entries without
    /// a usable title or URL are dropped. A listing without an entry array is
    /// retried like any other failure and ends as
    /// [`Error::RetriesExhausted`](crate::Error::RetriesExhausted).
    pub async fn fetch_playlist(
        &self,
        url: &str,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<Vec<TrackMetadata>> {
        let request = playlist_request(url);

        let tracks = run_with_retry(
            &self.retry.fetch_playlist,
            Phase::FetchPlaylist,
            cancel,
            |event| report_fetch(progress, "Fetching Playlist Info.", event),
            |_| {
                let request = &request;
                async move {
                    let output =
                        cancellable(cancel, self.extractor.execute(request, None, None)).await?;
                    parse_flat_playlist(&output.stdout)
                }
            },
        )
        .await?;

        tracing::info!(url, entries = tracks.len(), "Fetched playlist listing");
        Ok(tracks)
    }
}

pub(crate) fn playlist_request(url: &str) -> ExtractRequest {
    ExtractRequest::new(url)
        .option("--dump-single-json")
        .option("--flat-playlist")
        .option_value("--compat-options", "no-youtube-unavailable-videos")
}

fn report_fetch(progress: &ProgressSink, title: &str, event: RetryEvent<'_>) {
    match event {
        RetryEvent::Attempt {
            attempt,
            max_attempts,
        } => progress(ProgressEvent::new(
            0,
            title,
            format!("Attempt {}/{}", attempt, max_attempts),
        )),
        RetryEvent::Failed { attempt, error, .. } => progress(ProgressEvent::new(
            0,
            FETCH_ERROR_TITLE,
            format!("Fetch error (attempt {}): {}", attempt, error),
        )),
    }
}

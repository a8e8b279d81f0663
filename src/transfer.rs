//! TrackDownloader: transfer one resolved track into the staging directory

use crate::config::{Config, LibraryConfig, RetryPolicy, ToolConfig};
use crate::error::{Error, Phase, Result};
use crate::extractor::{ExtractRequest, MediaExtractor, ProgressCallback, ToolProgress};
use crate::retry::{RetryEvent, cancellable, run_with_retry};
use crate::types::{ProgressEvent, ProgressSink, TrackMetadata};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Metadata fields blanked when tags are embedded
const BLANKED_TAGS: &[&str] = &[
    "date",
    "description",
    "synopsis",
    "comment",
    "disc",
    "show",
    "season_number",
    "episode_id",
    "episode_sort",
];

/// A finished transfer waiting in the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Location of the staged file
    pub path: PathBuf,
    /// Sanitized title the file is named after
    pub title: String,
    /// Audio extension without the dot
    pub extension: String,
}

impl StagedFile {
    /// `<title>.<extension>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.title, self.extension)
    }
}

/// Runs audio-only transfers through the extraction tool
#[derive(Clone)]
pub struct TrackDownloader {
    extractor: Arc<dyn MediaExtractor>,
    staging_dir: PathBuf,
    library: LibraryConfig,
    tools: ToolConfig,
}

impl TrackDownloader {
    /// Create a downloader writing into `config.staging_dir`
    pub fn new(extractor: Arc<dyn MediaExtractor>, config: &Config) -> Self {
        Self {
            extractor,
            staging_dir: config.staging_dir.clone(),
            library: config.library.clone(),
            tools: config.tools.clone(),
        }
    }

    /// Download `track` as `extension` audio into staging
    ///
    /// `track.title` must already be sanitized; it names the staged file.
    /// The tool retries low-level transport errors itself (`--retries`); this
    /// retries whole tool runs under `policy`. `process_id` lets the
    /// orchestrator interrupt the running tool.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingOutput`] (retried) when the tool succeeds but the
    ///   staged file is not there
    /// - [`Error::RetriesExhausted`] once `policy` is spent
    /// - [`Error::Cancelled`] when `cancel` fires
    pub async fn download(
        &self,
        track: &TrackMetadata,
        extension: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        progress: &ProgressSink,
        process_id: &str,
    ) -> Result<StagedFile> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let request = self.build_request(track, extension);
        let staged = StagedFile {
            path: self.staging_dir.join(format!("{}.{}", track.title, extension)),
            title: track.title.clone(),
            extension: extension.to_string(),
        };

        run_with_retry(
            policy,
            Phase::Download,
            cancel,
            |event| report_download(progress, &track.title, event),
            |_| {
                let request = &request;
                let staged = &staged;
                let callback = tool_progress_callback(progress.clone(), track.title.clone());
                async move {
                    let output = cancellable(
                        cancel,
                        self.extractor.execute(request, Some(process_id), Some(callback)),
                    )
                    .await?;
                    let warnings = output.stderr.trim();
                    if !warnings.is_empty() {
                        tracing::debug!(
                            title = %track.title,
                            stderr = %warnings,
                            "yt-dlp reported warnings"
                        );
                    }

                    if !tokio::fs::try_exists(&staged.path).await.unwrap_or(false) {
                        return Err(Error::MissingOutput {
                            path: staged.path.clone(),
                        });
                    }
                    Ok(staged.clone())
                }
            },
        )
        .await
    }

    /// Build the tool invocation for one track
    pub(crate) fn build_request(&self, track: &TrackMetadata, extension: &str) -> ExtractRequest {
        let mut request = ExtractRequest::new(&track.source_url)
            .option("-x")
            .option("--no-playlist")
            .option_value("--retries", self.tools.network_retries)
            .option("--no-mtime");

        if self.library.embed_thumbnail {
            request = request.option("--embed-thumbnail");
        }

        if self.library.embed_metadata {
            request = request.option("--embed-metadata").option_value(
                "--parse-metadata",
                format!(":(?P<meta_title>{})", track.title),
            );
            if let Some(uploader) = track.uploader.as_deref().filter(|u| !u.is_empty()) {
                request = request.option_value(
                    "--parse-metadata",
                    format!(":(?P<meta_artist>{})", uploader),
                );
            }
            for tag in BLANKED_TAGS {
                request =
                    request.option_value("--parse-metadata", format!(":(?P<meta_{}>)", tag));
            }
        }

        let output = self
            .staging_dir
            .join(format!("{}.%(ext)s", track.title));
        request
            .option_value("--min-sleep-interval", self.tools.min_sleep_interval)
            .option_value("--max-sleep-interval", self.tools.max_sleep_interval)
            .option_value("--sleep-requests", self.tools.sleep_requests)
            .option_value("--retry-sleep", self.tools.retry_sleep)
            .option_value("--limit-rate", &self.tools.limit_rate)
            .option_value("--audio-format", extension)
            .option_value("-o", output.display())
    }
}

fn tool_progress_callback(progress: ProgressSink, title: String) -> ProgressCallback {
    Arc::new(move |tick: ToolProgress| progress(tool_progress_event(&title, &tick)))
}

fn tool_progress_event(title: &str, tick: &ToolProgress) -> ProgressEvent {
    if tick.eta_seconds < 0 {
        return ProgressEvent::new(0, title, "Preparing Downloader...");
    }
    let percent = tick.percent.abs() as u8;
    ProgressEvent::new(
        percent,
        title,
        format!("Downloading: {}% (ETA {}s)", percent, tick.eta_seconds),
    )
}

fn report_download(progress: &ProgressSink, title: &str, event: RetryEvent<'_>) {
    let detail = match event {
        RetryEvent::Attempt {
            attempt,
            max_attempts,
        } => format!("Attempt {}/{}", attempt, max_attempts),
        RetryEvent::Failed { attempt, error, .. } => {
            format!("Download error (attempt {}): {}", attempt, error)
        }
    };
    progress(ProgressEvent::new(0, title, detail));
}

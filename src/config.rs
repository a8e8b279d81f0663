//! Configuration types for audio-dl

use crate::error::{Error, Result};
use crate::types::DirectoryRef;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Library settings (target directory, audio format, embedding)
///
/// Groups the user-facing preferences that shape what ends up in the library.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Managed directory finished tracks are published into (None = not chosen yet)
    #[serde(default)]
    pub library_dir: Option<DirectoryRef>,

    /// Audio format requested from the extraction tool (default: "opus")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Embed the source thumbnail as cover art (default: false)
    #[serde(default)]
    pub embed_thumbnail: bool,

    /// Embed title/artist tags and blank the noisy ones (default: false)
    #[serde(default)]
    pub embed_metadata: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            file_extension: default_file_extension(),
            embed_thumbnail: false,
            embed_metadata: false,
        }
    }
}

/// Backoff policy for one retried phase
///
/// The delay after a failed attempt `n` (1-indexed) is
/// `min(base_delay * 2^n, max_delay)` plus, when `jitter` is set,
/// a uniform random extra of up to half that value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Base delay the exponential backoff grows from
    #[serde(with = "duration_ms_serde")]
    pub base_delay: Duration,

    /// Upper bound on the backoff before jitter
    #[serde(with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy with the given attempts and base delay, the default cap and jitter on
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: default_max_backoff(),
            jitter: true,
        }
    }
}

/// Retry budgets for every retried phase
///
/// Metadata fetches and transfers are tuned independently; a playlist track
/// gets a smaller transfer budget than a single requested item since the
/// batch moves on anyway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Info fetch for a single item (default: 3 attempts, 1s base)
    #[serde(default = "default_fetch_single")]
    pub fetch_single: RetryPolicy,

    /// Flat playlist listing (default: 3 attempts, 1s base)
    #[serde(default = "default_fetch_playlist")]
    pub fetch_playlist: RetryPolicy,

    /// Transfer of a single requested item (default: 4 attempts, 2s base)
    #[serde(default = "default_download_single")]
    pub download_single: RetryPolicy,

    /// Transfer of one playlist track (default: 3 attempts, 2s base)
    #[serde(default = "default_download_playlist_track")]
    pub download_playlist_track: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fetch_single: default_fetch_single(),
            fetch_playlist: default_fetch_playlist(),
            download_single: default_download_single(),
            download_playlist_track: default_download_playlist_track(),
        }
    }
}

/// External tool settings (yt-dlp binary and its own network behavior)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Path to the yt-dlp binary (None = search PATH when `search_path` is set)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Search PATH for yt-dlp when no explicit path is configured (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Low-level transport retries handled by the tool itself (default: 10)
    #[serde(default = "default_network_retries")]
    pub network_retries: u32,

    /// Bandwidth cap passed to the tool (default: "2M")
    #[serde(default = "default_limit_rate")]
    pub limit_rate: String,

    /// Minimum seconds the tool sleeps before each download (default: 1)
    #[serde(default = "default_min_sleep_interval")]
    pub min_sleep_interval: u32,

    /// Maximum seconds the tool sleeps before each download (default: 4)
    #[serde(default = "default_max_sleep_interval")]
    pub max_sleep_interval: u32,

    /// Seconds between the tool's metadata requests (default: 1)
    #[serde(default = "default_one")]
    pub sleep_requests: u32,

    /// Seconds the tool waits between its own retries (default: 1)
    #[serde(default = "default_one")]
    pub retry_sleep: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            search_path: true,
            network_retries: default_network_retries(),
            limit_rate: default_limit_rate(),
            min_sleep_interval: default_min_sleep_interval(),
            max_sleep_interval: default_max_sleep_interval(),
            sleep_requests: default_one(),
            retry_sleep: default_one(),
        }
    }
}

/// Delay between consecutive playlist items
///
/// Not a retry: it spaces out requests so a long playlist does not hammer the
/// source platform. The actual delay is drawn uniformly from `[min_delay, max_delay)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Lower bound (default: 1000 ms)
    #[serde(default = "default_politeness_min", with = "duration_ms_serde")]
    pub min_delay: Duration,

    /// Upper bound, exclusive (default: 4000 ms)
    #[serde(default = "default_politeness_max", with = "duration_ms_serde")]
    pub max_delay: Duration,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            min_delay: default_politeness_min(),
            max_delay: default_politeness_max(),
        }
    }
}

/// Main configuration for DownloadOrchestrator
///
/// Fields are organized into logical sub-configs:
/// - [`library`](LibraryConfig): target directory, format, embedding
/// - [`retry`](RetryConfig): per-phase retry budgets
/// - [`tools`](ToolConfig): yt-dlp location and its network knobs
/// - [`politeness`](PolitenessConfig): inter-item delay for playlists
///
/// Every field has a default, so `{}` is a valid JSON config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Library settings
    #[serde(default)]
    pub library: LibraryConfig,

    /// Private staging directory transfers are written to (default: "./staging")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Retry budgets
    #[serde(default)]
    pub retry: RetryConfig,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolConfig,

    /// Inter-item delay for playlist jobs
    #[serde(default)]
    pub politeness: PolitenessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            staging_dir: default_staging_dir(),
            retry: RetryConfig::default(),
            tools: ToolConfig::default(),
            politeness: PolitenessConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<()> {
        let ext = &self.library.file_extension;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(config_error(
                format!("file extension '{}' must be non-empty and alphanumeric", ext),
                "library.file_extension",
            ));
        }

        let policies = [
            ("retry.fetch_single", &self.retry.fetch_single),
            ("retry.fetch_playlist", &self.retry.fetch_playlist),
            ("retry.download_single", &self.retry.download_single),
            (
                "retry.download_playlist_track",
                &self.retry.download_playlist_track,
            ),
        ];
        for (key, policy) in policies {
            if policy.max_attempts == 0 {
                return Err(config_error("max_attempts must be at least 1", key));
            }
            if policy.base_delay > policy.max_delay {
                return Err(config_error("base_delay must not exceed max_delay", key));
            }
        }

        if self.politeness.min_delay > self.politeness.max_delay {
            return Err(config_error(
                "min_delay must not exceed max_delay",
                "politeness",
            ));
        }

        if self.tools.min_sleep_interval > self.tools.max_sleep_interval {
            return Err(config_error(
                "min_sleep_interval must not exceed max_sleep_interval",
                "tools.min_sleep_interval",
            ));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_file_extension() -> String {
    "opus".to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./staging")
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_max_backoff() -> Duration {
    Duration::from_millis(32_000)
}

fn default_fetch_single() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1000))
}

fn default_fetch_playlist() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1000))
}

fn default_download_single() -> RetryPolicy {
    RetryPolicy::new(4, Duration::from_millis(2000))
}

fn default_download_playlist_track() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(2000))
}

fn default_network_retries() -> u32 {
    10
}

fn default_limit_rate() -> String {
    "2M".to_string()
}

fn default_min_sleep_interval() -> u32 {
    1
}

fn default_max_sleep_interval() -> u32 {
    4
}

fn default_politeness_min() -> Duration {
    Duration::from_millis(1000)
}

fn default_politeness_max() -> Duration {
    Duration::from_millis(4000)
}

// Durations are written as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

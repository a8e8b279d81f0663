//! External media extraction
//!
//! Resolving and transferring media is delegated to an external tool. The core
//! abstraction is the [`MediaExtractor`] trait, with two implementations:
//!
//! - [`YtDlpCli`]: runs the `yt-dlp` binary for full functionality
//! - [`UnavailableExtractor`]: stub used when no binary is configured or found
//!
//! ## Usage
//!
//! ```no_run
//! use audio_dl::extractor::{ExtractRequest, MediaExtractor, YtDlpCli};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = YtDlpCli::from_path().expect("yt-dlp binary not found");
//!
//!     let request = ExtractRequest::new("https://youtu.be/dQw4w9WgXcQ").option("--no-playlist");
//!     let info = extractor.get_info(&request).await?;
//!     println!("title: {:?}", info.title);
//!     Ok(())
//! }
//! ```

mod cli;
mod parser;
mod request;
mod traits;
mod unavailable;

pub use cli::YtDlpCli;
pub use parser::{parse_flat_playlist, parse_info_json, parse_progress_line};
pub use request::ExtractRequest;
pub use traits::{ExecuteOutput, MediaExtractor, ProgressCallback, ToolProgress, VideoInfo};
pub use unavailable::UnavailableExtractor;

use crate::config::ToolConfig;
use std::sync::Arc;

/// Pick the extractor for a tool configuration
///
/// An explicit `ytdlp_path` wins. Otherwise `PATH` is searched when allowed, and
/// the [`UnavailableExtractor`] is used when nothing is found.
pub fn from_config(config: &ToolConfig) -> Arc<dyn MediaExtractor> {
    if let Some(path) = &config.ytdlp_path {
        return Arc::new(YtDlpCli::new(path.clone()));
    }
    if config.search_path
        && let Some(cli) = YtDlpCli::from_path()
    {
        tracing::info!(path = %cli.binary_path().display(), "Found yt-dlp in PATH");
        return Arc::new(cli);
    }
    tracing::warn!("yt-dlp not configured or found in PATH, downloads are unavailable");
    Arc::new(UnavailableExtractor)
}

//! # audio-dl
//!
//! Download orchestration engine for audio library applications.
//!
//! Turns a media or playlist URL into finished audio files in a managed
//! library directory, one job at a time, with retries, cooperative
//! cancellation and partial-failure tolerance for playlists.
//!
//! ## Design Philosophy
//!
//! audio-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Capability-based** - The extraction tool, the storage provider and the
//!   connectivity check are traits the host can swap out
//! - **Sensible defaults** - Works out of the box once a library directory is set
//!
//! ## Quick Start
//!
//! ```no_run
//! use audio_dl::{Config, DirectoryRef, DownloadOrchestrator, DownloadRequest, Event};
//! use audio_dl::connectivity::ProbeConnectivity;
//! use audio_dl::storage::LocalStorage;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.library.library_dir = Some(DirectoryRef::new("/home/me/Music"));
//!
//!     let orchestrator = DownloadOrchestrator::with_default_extractor(
//!         config,
//!         Arc::new(LocalStorage::new()),
//!         Arc::new(ProbeConnectivity::default()),
//!     )
//!     .await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = orchestrator
//!         .submit(DownloadRequest::new("https://www.youtube.com/playlist?list=PL123"))
//!         .await?;
//!     println!("{:?}", handle.wait().await);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![deny(unused_must_use)]

/// Configuration types
pub mod config;
/// Network connectivity checks
pub mod connectivity;
/// Error types
pub mod error;
/// External extraction tool (yt-dlp)
pub mod extractor;
/// Metadata fetching for single items and playlists
pub mod fetcher;
/// Library snapshot and existence checks
pub mod library;
/// Job orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Publishing staged files into the library
pub mod publisher;
/// Request classification and platform allow-list
pub mod request;
/// Retry logic with exponential backoff
pub mod retry;
/// Managed storage providers
pub mod storage;
/// Track transfers into staging
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, LibraryConfig, PolitenessConfig, RetryConfig, RetryPolicy, ToolConfig};
pub use connectivity::{Connectivity, Transport};
pub use error::{Error, Phase, PreconditionError, Result, TerminalReason};
pub use extractor::{MediaExtractor, UnavailableExtractor, YtDlpCli};
pub use orchestrator::{DownloadOrchestrator, JobHandle};
pub use request::{RequestKind, is_supported_platform};
pub use storage::{LocalStorage, ManagedStorage};
pub use types::{
    DirectoryRef, DownloadJob, DownloadRequest, Event, JobId, JobOutcome, JobState, JobSummary,
    ProgressEvent, TrackMetadata,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's `shutdown()` method,
/// which cancels any running job.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use audio_dl::{Config, DownloadOrchestrator, run_with_shutdown};
/// use audio_dl::connectivity::StaticConnectivity;
/// use audio_dl::storage::LocalStorage;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = DownloadOrchestrator::with_default_extractor(
///         Config::default(),
///         Arc::new(LocalStorage::new()),
///         Arc::new(StaticConnectivity::online()),
///     )
///     .await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: DownloadOrchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(
                error = %e,
                "Could not register any signal handlers, using ctrl_c fallback"
            );
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}

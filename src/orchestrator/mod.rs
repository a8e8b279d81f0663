//! Download job orchestration, split into focused submodules.
//!
//! The `DownloadOrchestrator` struct and its methods are organized by domain:
//! - [`control`] - Submission, single-flight claiming, cancellation and shutdown
//! - [`job`] - The per-job state machine (single-item and playlist paths)

mod control;
mod job;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::extractor::{self, MediaExtractor};
use crate::storage::ManagedStorage;
use crate::types::{DownloadJob, Event, JobId, JobOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// The job currently owned by an orchestrator, plus its cancellation token
pub(crate) struct ActiveJob {
    pub(crate) job: DownloadJob,
    pub(crate) token: CancellationToken,
}

/// Single-flight and lifecycle state
#[derive(Clone)]
pub(crate) struct ControlState {
    /// Set while a job exists; claimed with compare-exchange in `submit`
    pub(crate) active: Arc<AtomicBool>,
    /// Cleared by `shutdown` so new submissions are refused
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Source of job IDs
    pub(crate) next_id: Arc<AtomicU64>,
    /// Snapshot of the running job for `current_job` and `cancel`
    pub(crate) current: Arc<tokio::sync::Mutex<Option<ActiveJob>>>,
}

impl ControlState {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_id: Arc::new(AtomicU64::new(0)),
            current: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }
}

/// Releases the single-flight flag when dropped, including on panic
pub(crate) struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl ActiveGuard {
    /// Claim the flag, or `None` if a job already holds it
    pub(crate) fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Handle to an accepted job
pub struct JobHandle {
    id: JobId,
    join: tokio::task::JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// The job's ID, as carried by its events
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the job to reach a terminal state
    ///
    /// By the time this returns, `Shutdown` has been emitted and the
    /// orchestrator accepts a new submission.
    pub async fn wait(self) -> JobOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = self.id.0, error = %e, "Job task ended abnormally");
                JobOutcome::Failed {
                    error: format!("job task ended abnormally: {}", e),
                }
            }
        }
    }
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
///
/// Runs at most one download job at a time. Hosts submit requests, subscribe
/// to [`Event`]s for progress, and call [`cancel`](Self::cancel) or
/// [`shutdown`](Self::shutdown) to stop.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// External extraction tool
    pub(crate) extractor: Arc<dyn MediaExtractor>,
    /// Provider that owns the library directory
    pub(crate) storage: Arc<dyn ManagedStorage>,
    /// Network precondition check
    pub(crate) connectivity: Arc<dyn Connectivity>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Single-flight and lifecycle state
    pub(crate) control: ControlState,
}

impl DownloadOrchestrator {
    /// Create a new orchestrator
    ///
    /// Validates `config` and creates the staging directory.
    pub async fn new(
        config: Config,
        extractor: Arc<dyn MediaExtractor>,
        storage: Arc<dyn ManagedStorage>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.staging_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create staging directory '{}': {}",
                        config.staging_dir.display(),
                        e
                    ),
                ))
            })?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            extractor = extractor.name(),
            staging_dir = %config.staging_dir.display(),
            "Download orchestrator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            extractor,
            storage,
            connectivity,
            event_tx,
            control: ControlState::new(),
        })
    }

    /// Create an orchestrator whose extractor is chosen from `config.tools`
    ///
    /// Uses the configured yt-dlp binary, else one found on `PATH`, else the
    /// [`UnavailableExtractor`](crate::extractor::UnavailableExtractor).
    pub async fn with_default_extractor(
        config: Config,
        storage: Arc<dyn ManagedStorage>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        let extractor = extractor::from_config(&config.tools);
        Self::new(config, extractor, storage, connectivity).await
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use audio_dl::{Config, DownloadOrchestrator, Event};
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
    ///     let mut events = orchestrator.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let Event::Shutdown { job_id } = event {
    ///                 println!("job {} released its resources", job_id);
    ///             }
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether a job currently holds the single-flight slot
    pub fn is_active(&self) -> bool {
        self.control.active.load(Ordering::SeqCst)
    }

    /// Snapshot of the running job, if any
    pub async fn current_job(&self) -> Option<DownloadJob> {
        self.control
            .current
            .lock()
            .await
            .as_ref()
            .map(|active| active.job.clone())
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Process ID the extractor registers a job's tool runs under
pub(crate) fn process_id(id: JobId) -> String {
    format!("audio-dl-job-{}", id)
}

//! Job control: submit, cancel and shutdown.

use crate::error::{PreconditionError, Result};
use crate::types::{DirectoryRef, DownloadJob, DownloadRequest, JobId};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ActiveGuard, ActiveJob, DownloadOrchestrator, JobHandle, process_id};

impl DownloadOrchestrator {
    /// Submit a request and start it as the single active job
    ///
    /// Preconditions are checked in order and fail fast without creating a job:
    /// shutdown in progress, another job active, no usable network, library
    /// directory not set. None of them is retried.
    ///
    /// The job is registered before the checks run. A [`cancel`](Self::cancel)
    /// that lands during them makes the job end as `Cancelled` right away, and a
    /// [`shutdown`](Self::shutdown) that lands during them rejects the request.
    ///
    /// # Errors
    ///
    /// [`Error::Precondition`](crate::Error::Precondition) with the violated
    /// [`PreconditionError`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use audio_dl::*;
    /// # async fn example(orchestrator: DownloadOrchestrator) -> Result<()> {
    /// let handle = orchestrator
    ///     .submit(DownloadRequest::new("https://www.youtube.com/playlist?list=PL123"))
    ///     .await?;
    /// let outcome = handle.wait().await;
    /// println!("{:?}", outcome);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(&self, request: DownloadRequest) -> Result<JobHandle> {
        if !self.control.accepting_new.load(Ordering::SeqCst) {
            return Err(PreconditionError::ShuttingDown.into());
        }

        let Some(guard) = ActiveGuard::claim(&self.control.active) else {
            tracing::warn!(
                url = %request.url,
                "Download already in progress, ignoring new request"
            );
            return Err(PreconditionError::JobActive.into());
        };

        // Register the job before awaiting anything, so a cancel or shutdown
        // issued while the preconditions are checked still reaches it
        let id = JobId(self.control.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let job = DownloadJob::new(id, &request);
        let token = CancellationToken::new();
        *self.control.current.lock().await = Some(ActiveJob {
            job: job.clone(),
            token: token.clone(),
        });

        // Returning early clears the registration, then drops the guard
        let library_dir = match self.check_preconditions(&request).await {
            Ok(dir) => dir,
            Err(e) => {
                *self.control.current.lock().await = None;
                return Err(e);
            }
        };
        if !self.control.accepting_new.load(Ordering::SeqCst) {
            tracing::info!(
                url = %request.url,
                "Shutdown started during submission, rejecting request"
            );
            *self.control.current.lock().await = None;
            return Err(PreconditionError::ShuttingDown.into());
        }

        tracing::info!(
            job_id = id.0,
            url = %job.url,
            kind = ?job.kind,
            "Accepted download request"
        );

        let orchestrator = self.clone();
        let join = tokio::spawn(async move {
            orchestrator.run_job(job, library_dir, token, guard).await
        });

        Ok(JobHandle { id, join })
    }

    async fn check_preconditions(&self, request: &DownloadRequest) -> Result<DirectoryRef> {
        if !self.connectivity.has_active_transport().await {
            tracing::warn!(url = %request.url, "No network connection, rejecting request");
            return Err(PreconditionError::NoNetwork.into());
        }

        let Some(library_dir) = self.config.library.library_dir.clone() else {
            tracing::warn!(url = %request.url, "Audio directory is not set, rejecting request");
            return Err(PreconditionError::LibraryNotConfigured.into());
        };
        Ok(library_dir)
    }

    /// Cancel the active job
    ///
    /// Cancellation is cooperative: it is honored at phase boundaries and inside
    /// backoff and politeness sleeps, and it interrupts a running tool process.
    /// The job then ends as `Cancelled`, never as `Failed`.
    ///
    /// Returns `false` when no job is running.
    pub async fn cancel(&self) -> bool {
        let id = {
            let current = self.control.current.lock().await;
            let Some(active) = current.as_ref() else {
                return false;
            };
            active.token.cancel();
            active.job.id
        };

        let interrupted = self.extractor.cancel(&process_id(id)).await;
        tracing::info!(job_id = id.0, interrupted_tool = interrupted, "Cancellation requested");
        true
    }

    /// Gracefully shut down the orchestrator
    ///
    /// 1. Stops accepting new submissions
    /// 2. Cancels the active job, if any
    /// 3. Waits (30 second timeout) for it to emit `Shutdown` and free the slot
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.control.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        if self.cancel().await {
            tracing::info!("Signaled cancellation to the active job");
        }

        let shutdown_timeout = Duration::from_secs(30);
        match tokio::time::timeout(shutdown_timeout, self.wait_until_idle()).await {
            Ok(()) => tracing::info!("Active job finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for the active job, proceeding with shutdown")
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_until_idle(&self) {
        while self.control.active.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

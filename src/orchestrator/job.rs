//! Per-job state machine: classification, the single-item path and the playlist path.

use crate::config::{PolitenessConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::fetcher::MetadataFetcher;
use crate::library::{LibrarySnapshot, find_existing};
use crate::publisher::StagingPublisher;
use crate::request::RequestKind;
use crate::retry::sleep_cancellable;
use crate::transfer::{StagedFile, TrackDownloader};
use crate::types::{
    DirectoryRef, DownloadJob, Event, JobOutcome, JobState, JobSummary, ProgressEvent,
    ProgressSink, TrackMetadata,
};
use crate::utils::sanitize_filename;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ActiveGuard, DownloadOrchestrator, process_id};

impl DownloadOrchestrator {
    /// Body of the job task
    ///
    /// Always emits the terminal event followed by `Shutdown`, then frees the
    /// single-flight slot by dropping `guard`. The phases run on an inner task,
    /// so a panic in a host-supplied storage provider or sink still ends the
    /// job as `Failed` with those events.
    pub(super) async fn run_job(
        self,
        job: DownloadJob,
        library_dir: DirectoryRef,
        token: CancellationToken,
        guard: ActiveGuard,
    ) -> JobOutcome {
        let job_id = job.id;
        let runner = JobRunner::new(self.clone(), job, token);
        let result = tokio::spawn(async move {
            let mut runner = runner;
            runner.run(&library_dir).await
        })
        .await;

        let outcome = match result {
            Ok(Ok(summary)) => {
                tracing::info!(
                    job_id = job_id.0,
                    published = summary.published,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Job completed"
                );
                JobOutcome::Completed { summary }
            }
            Ok(Err(e)) if e.is_cancelled() => {
                tracing::info!(job_id = job_id.0, "Job cancelled");
                JobOutcome::Cancelled
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = job_id.0, error = %e, "Job failed");
                JobOutcome::Failed {
                    error: e.user_message(),
                }
            }
            Err(e) => {
                tracing::error!(job_id = job_id.0, error = %e, "Job task ended abnormally");
                JobOutcome::Failed {
                    error: format!("job task ended abnormally: {}", e),
                }
            }
        };

        let state = match &outcome {
            JobOutcome::Completed { .. } => JobState::Completed,
            JobOutcome::Failed { .. } => JobState::Failed,
            JobOutcome::Cancelled => JobState::Cancelled,
        };
        self.emit_event(Event::StateChanged { job_id, state });
        match &outcome {
            JobOutcome::Completed { summary } => self.emit_event(Event::Completed {
                job_id,
                summary: summary.clone(),
            }),
            JobOutcome::Failed { error } => self.emit_event(Event::Failed {
                job_id,
                error: error.clone(),
            }),
            JobOutcome::Cancelled => self.emit_event(Event::Cancelled { job_id }),
        }
        self.emit_event(Event::Shutdown { job_id });

        *self.control.current.lock().await = None;
        drop(guard);
        outcome
    }

    fn progress_sink(&self, job: &DownloadJob) -> ProgressSink {
        let tx = self.event_tx.clone();
        let job_id = job.id;
        Arc::new(move |progress: ProgressEvent| {
            tx.send(Event::Progress { job_id, progress }).ok();
        })
    }
}

/// Drives one job through its phases on the job task
struct JobRunner {
    orchestrator: DownloadOrchestrator,
    job: DownloadJob,
    token: CancellationToken,
    progress: ProgressSink,
    fetcher: MetadataFetcher,
    downloader: TrackDownloader,
    publisher: StagingPublisher,
    process_id: String,
}

impl JobRunner {
    fn new(orchestrator: DownloadOrchestrator, job: DownloadJob, token: CancellationToken) -> Self {
        let config = &orchestrator.config;
        let fetcher = MetadataFetcher::new(orchestrator.extractor.clone(), config.retry.clone());
        let downloader = TrackDownloader::new(orchestrator.extractor.clone(), config);
        let publisher = StagingPublisher::new(orchestrator.storage.clone());
        let progress = orchestrator.progress_sink(&job);
        let process_id = process_id(job.id);

        Self {
            orchestrator,
            job,
            token,
            progress,
            fetcher,
            downloader,
            publisher,
            process_id,
        }
    }

    async fn run(&mut self, library_dir: &DirectoryRef) -> Result<JobSummary> {
        self.enter(JobState::Classifying).await?;
        match self.job.kind {
            RequestKind::Single => self.run_single(library_dir).await,
            RequestKind::Playlist => self.run_playlist(library_dir).await,
        }
    }

    /// Move to `state`, unless cancellation was requested
    async fn enter(&mut self, state: JobState) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.job.state = state;
        self.sync().await;
        self.orchestrator.emit_event(Event::StateChanged {
            job_id: self.job.id,
            state,
        });
        tracing::info!(job_id = self.job.id.0, state = ?state, "Job state changed");
        Ok(())
    }

    /// Mirror the job into the orchestrator so `current_job` sees it
    async fn sync(&self) {
        if let Some(active) = self.orchestrator.control.current.lock().await.as_mut() {
            active.job = self.job.clone();
        }
    }

    async fn run_single(&mut self, library_dir: &DirectoryRef) -> Result<JobSummary> {
        self.enter(JobState::FetchingMetadata).await?;
        let metadata = self
            .fetcher
            .fetch_single(&self.job.url, &self.token, &self.progress)
            .await?;

        let title = sanitize_filename(&metadata.title);
        if title.is_empty() {
            return Err(Error::InvalidMetadata(format!(
                "no usable title for {}",
                self.job.url
            )));
        }

        let storage = self.orchestrator.storage.clone();
        if let Some(existing) = find_existing(storage.as_ref(), library_dir, &title).await? {
            tracing::info!(
                job_id = self.job.id.0,
                title = %title,
                existing = %existing.display_name,
                "Track already in library"
            );
            return Err(Error::AlreadyExists { title });
        }

        let track = TrackMetadata { title, ..metadata };
        let policy = self.orchestrator.config.retry.download_single.clone();
        self.transfer(&track, &policy, library_dir).await?;

        Ok(JobSummary {
            published: 1,
            ..Default::default()
        })
    }

    async fn run_playlist(&mut self, library_dir: &DirectoryRef) -> Result<JobSummary> {
        self.enter(JobState::FetchingMetadata).await?;
        let entries = self
            .fetcher
            .fetch_playlist(&self.job.url, &self.token, &self.progress)
            .await?;
        let (order, tracks) = index_by_title(entries, self.job.id.0);

        let storage = self.orchestrator.storage.clone();
        let snapshot = LibrarySnapshot::capture(storage.as_ref(), library_dir).await?;
        let (missing, present): (Vec<String>, Vec<String>) =
            order.into_iter().partition(|title| !snapshot.contains(title));

        let mut summary = JobSummary {
            skipped: present.len(),
            ..Default::default()
        };
        let total = missing.len();
        self.job.total_items = Some(total);
        self.sync().await;
        tracing::info!(
            job_id = self.job.id.0,
            missing = total,
            skipped = summary.skipped,
            "Computed missing playlist items"
        );

        let policy = self.orchestrator.config.retry.download_playlist_track.clone();
        for (index, title) in missing.iter().enumerate() {
            if index > 0 {
                let delay = politeness_delay(&self.orchestrator.config.politeness);
                tracing::debug!(
                    job_id = self.job.id.0,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before next item"
                );
                sleep_cancellable(delay, &self.token).await?;
            }
            let Some(track) = tracks.get(title) else {
                continue;
            };

            self.job.current_index = index;
            (self.progress)(ProgressEvent::new(
                (index * 100 / total) as u8,
                title.as_str(),
                format!("Track {}/{}", index + 1, total),
            ));

            match self.transfer(track, &policy, library_dir).await {
                Ok(()) => summary.published += 1,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        job_id = self.job.id.0,
                        title = %title,
                        error = %e,
                        "Playlist item failed, continuing"
                    );
                    let message = e.user_message();
                    self.job.last_error = Some(message.clone());
                    self.sync().await;
                    self.orchestrator.emit_event(Event::ItemFailed {
                        job_id: self.job.id,
                        title: title.clone(),
                        error: message,
                    });
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Download one track into staging and publish it
    async fn transfer(
        &mut self,
        track: &TrackMetadata,
        policy: &RetryPolicy,
        library_dir: &DirectoryRef,
    ) -> Result<()> {
        self.enter(JobState::Downloading).await?;
        let extension = self.orchestrator.config.library.file_extension.clone();
        let staged = self
            .downloader
            .download(
                track,
                &extension,
                policy,
                &self.token,
                &self.progress,
                &self.process_id,
            )
            .await?;

        self.publish(staged, library_dir).await
    }

    async fn publish(&mut self, staged: StagedFile, library_dir: &DirectoryRef) -> Result<()> {
        if let Err(e) = self.enter(JobState::Publishing).await {
            self.publisher.discard(&staged).await;
            return Err(e);
        }
        self.publisher.publish(&staged, library_dir).await?;
        self.orchestrator.emit_event(Event::ItemPublished {
            job_id: self.job.id,
            title: staged.title,
        });
        Ok(())
    }
}

/// Map sanitized titles to tracks, keeping first-appearance order
///
/// A later entry with the same title replaces the earlier one.
fn index_by_title(
    entries: Vec<TrackMetadata>,
    job_id: u64,
) -> (Vec<String>, HashMap<String, TrackMetadata>) {
    let mut order = Vec::with_capacity(entries.len());
    let mut tracks: HashMap<String, TrackMetadata> = HashMap::with_capacity(entries.len());

    for entry in entries {
        let title = entry.title.clone();
        match tracks.insert(title.clone(), entry) {
            Some(replaced) => tracing::warn!(
                job_id,
                title = %title,
                dropped_url = %replaced.source_url,
                "Duplicate title in playlist, keeping the later entry"
            ),
            None => order.push(title),
        }
    }
    (order, tracks)
}

/// Uniform delay in `[min_delay, max_delay)`
fn politeness_delay(config: &PolitenessConfig) -> Duration {
    let min = config.min_delay.as_millis() as u64;
    let max = config.max_delay.as_millis() as u64;
    if max <= min {
        return config.min_delay;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..max))
}

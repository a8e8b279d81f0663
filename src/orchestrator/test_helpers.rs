//! Shared test helpers: a scripted extractor and ready-made orchestrators.

use crate::config::{Config, PolitenessConfig, RetryConfig, RetryPolicy};
use crate::connectivity::StaticConnectivity;
use crate::error::{Error, Result};
use crate::extractor::{
    ExecuteOutput, ExtractRequest, MediaExtractor, ProgressCallback, ToolProgress, VideoInfo,
};
use crate::orchestrator::DownloadOrchestrator;
use crate::storage::{FileHandle, LocalStorage, ManagedStorage, StorageEntry, StorageWriter};
use crate::types::{DirectoryRef, Event, ProgressEvent, ProgressSink};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Bytes the fake extractor writes for every successful transfer
pub(crate) const FAKE_AUDIO: &[u8] = b"fake audio payload";

#[derive(Clone)]
enum DownloadScript {
    Write,
    MissingOutput,
    Fail(String),
}

/// In-memory stand-in for yt-dlp
///
/// Responses are scripted per URL. Each URL has a queue: entries are consumed
/// in order and the last one repeats forever. Unscripted info and playlist
/// requests fail; unscripted downloads succeed and write `FAKE_AUDIO` to the
/// `-o` template.
#[derive(Default)]
pub(crate) struct FakeExtractor {
    info: Mutex<HashMap<String, VecDeque<std::result::Result<VideoInfo, String>>>>,
    playlists: Mutex<HashMap<String, String>>,
    downloads: Mutex<HashMap<String, VecDeque<DownloadScript>>>,
    download_delay: Option<Duration>,
    info_requests: Mutex<Vec<ExtractRequest>>,
    execute_requests: Mutex<Vec<ExtractRequest>>,
    download_counts: Mutex<HashMap<String, u32>>,
    running: Mutex<HashSet<String>>,
    cancelled: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a successful info lookup for `url`
    pub(crate) fn with_info(mut self, url: &str, title: &str) -> Self {
        let info = VideoInfo {
            id: Some(format!("id-{}", title.len())),
            title: Some(title.to_string()),
            uploader: Some("Uploader".to_string()),
            webpage_url: Some(url.to_string()),
        };
        push(self.info.get_mut().unwrap(), url, Ok(info));
        self
    }

    /// Queue a failed info lookup for `url` with the tool's message
    pub(crate) fn with_info_error(mut self, url: &str, message: &str) -> Self {
        push(self.info.get_mut().unwrap(), url, Err(message.to_string()));
        self
    }

    /// Serve a flat listing with the given `(title, url)` entries
    pub(crate) fn with_playlist(self, url: &str, entries: &[(&str, &str)]) -> Self {
        let entries: Vec<serde_json::Value> = entries
            .iter()
            .map(|(title, entry_url)| {
                serde_json::json!({ "title": title, "url": entry_url, "uploader": "Uploader" })
            })
            .collect();
        let document = serde_json::json!({ "_type": "playlist", "entries": entries });
        self.with_playlist_raw(url, &document.to_string())
    }

    /// Serve `stdout` verbatim for a flat listing of `url`
    pub(crate) fn with_playlist_raw(mut self, url: &str, stdout: &str) -> Self {
        self.playlists
            .get_mut()
            .unwrap()
            .insert(url.to_string(), stdout.to_string());
        self
    }

    /// Queue a failed transfer of `url`
    pub(crate) fn with_download_error(mut self, url: &str, message: &str) -> Self {
        push(
            self.downloads.get_mut().unwrap(),
            url,
            DownloadScript::Fail(message.to_string()),
        );
        self
    }

    /// Queue a transfer of `url` that exits cleanly without writing anything
    pub(crate) fn with_download_missing_output(mut self, url: &str) -> Self {
        push(
            self.downloads.get_mut().unwrap(),
            url,
            DownloadScript::MissingOutput,
        );
        self
    }

    /// Queue a successful transfer of `url` (after earlier scripted failures)
    pub(crate) fn with_download_ok(mut self, url: &str) -> Self {
        push(self.downloads.get_mut().unwrap(), url, DownloadScript::Write);
        self
    }

    /// Make every transfer take `delay` before doing anything
    pub(crate) fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub(crate) fn info_requests(&self) -> Vec<ExtractRequest> {
        self.info_requests.lock().unwrap().clone()
    }

    pub(crate) fn execute_requests(&self) -> Vec<ExtractRequest> {
        self.execute_requests.lock().unwrap().clone()
    }

    /// Number of transfer runs started for `url`
    pub(crate) fn download_count(&self, url: &str) -> u32 {
        self.download_counts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Total transfer runs across all URLs
    pub(crate) fn total_downloads(&self) -> u32 {
        self.download_counts.lock().unwrap().values().sum()
    }

    /// Process IDs passed to `cancel`
    pub(crate) fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    async fn transfer(
        &self,
        request: &ExtractRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<ExecuteOutput> {
        let url = request.url().to_string();
        *self
            .download_counts
            .lock()
            .unwrap()
            .entry(url.clone())
            .or_insert(0) += 1;

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        let script =
            next(&mut self.downloads.lock().unwrap(), &url).unwrap_or(DownloadScript::Write);
        match script {
            DownloadScript::Fail(message) => Err(Error::ExternalTool(message)),
            DownloadScript::MissingOutput => Ok(ExecuteOutput::default()),
            DownloadScript::Write => {
                if let Some(progress) = &progress {
                    progress(ToolProgress {
                        percent: 0.0,
                        eta_seconds: -1,
                        line: "[download] Destination: staging".to_string(),
                    });
                    progress(ToolProgress {
                        percent: 100.0,
                        eta_seconds: 0,
                        line: "[download] 100.0% of 3.00MiB at 1.00MiB/s ETA 00:00".to_string(),
                    });
                }

                let template = request.values_of("-o")[0].to_string();
                let extension = request.values_of("--audio-format")[0].to_string();
                let path = PathBuf::from(template.replace("%(ext)s", &extension));
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, FAKE_AUDIO).await?;
                Ok(ExecuteOutput::default())
            }
        }
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn get_info(&self, request: &ExtractRequest) -> Result<VideoInfo> {
        self.info_requests.lock().unwrap().push(request.clone());
        match next(&mut self.info.lock().unwrap(), request.url()) {
            Some(Ok(info)) => Ok(info),
            Some(Err(message)) => Err(Error::ExternalTool(message)),
            None => Err(Error::ExternalTool(format!(
                "no info scripted for {}",
                request.url()
            ))),
        }
    }

    async fn execute(
        &self,
        request: &ExtractRequest,
        process_id: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<ExecuteOutput> {
        self.execute_requests.lock().unwrap().push(request.clone());

        if request.has_option("--flat-playlist") {
            let stdout = self.playlists.lock().unwrap().get(request.url()).cloned();
            return match stdout {
                Some(stdout) => Ok(ExecuteOutput {
                    stdout,
                    stderr: String::new(),
                }),
                None => Err(Error::ExternalTool(format!(
                    "no playlist scripted for {}",
                    request.url()
                ))),
            };
        }

        if let Some(id) = process_id {
            self.running.lock().unwrap().insert(id.to_string());
        }
        let result = self.transfer(request, progress).await;
        if let Some(id) = process_id {
            self.running.lock().unwrap().remove(id);
        }
        result
    }

    async fn cancel(&self, process_id: &str) -> bool {
        self.cancelled.lock().unwrap().push(process_id.to_string());
        self.running.lock().unwrap().contains(process_id)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn push<T>(scripts: &mut HashMap<String, VecDeque<T>>, url: &str, script: T) {
    scripts.entry(url.to_string()).or_default().push_back(script);
}

fn next<T: Clone>(scripts: &mut HashMap<String, VecDeque<T>>, url: &str) -> Option<T> {
    let queue = scripts.get_mut(url)?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        jitter: false,
    }
}

/// Default attempt counts with millisecond delays
pub(crate) fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        fetch_single: fast_policy(3),
        fetch_playlist: fast_policy(3),
        download_single: fast_policy(4),
        download_playlist_track: fast_policy(3),
    }
}

/// A progress sink that records every event
pub(crate) fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let sink: ProgressSink = Arc::new(move |event| recorded.lock().unwrap().push(event));
    (sink, events)
}

/// An orchestrator over a temp directory, kept alive alongside it
pub(crate) struct TestSetup {
    pub(crate) orchestrator: DownloadOrchestrator,
    pub(crate) fake: Arc<FakeExtractor>,
    pub(crate) connectivity: Arc<StaticConnectivity>,
    pub(crate) library_path: PathBuf,
    pub(crate) staging_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestSetup {
    /// Put a file into the library as if the user already had it
    pub(crate) fn add_to_library(&self, name: &str) {
        std::fs::write(self.library_path.join(name), b"existing").unwrap();
    }

    /// Names of the files in the library, sorted
    pub(crate) fn library_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.library_path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Names of the files left in staging
    pub(crate) fn staging_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.staging_path) {
            Ok(entries) => entries
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Config with a library in `temp`, fast retries and no politeness delay
pub(crate) fn test_config(temp: &TempDir) -> Config {
    Config {
        staging_dir: temp.path().join("staging"),
        retry: fast_retry_config(),
        politeness: PolitenessConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        library: crate::config::LibraryConfig {
            library_dir: Some(DirectoryRef::new(
                temp.path().join("library").to_string_lossy(),
            )),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build an online orchestrator over `fake`
pub(crate) async fn create_test_orchestrator(fake: FakeExtractor) -> TestSetup {
    create_test_orchestrator_with(fake, |_| {}).await
}

/// Build an online orchestrator over `fake`, adjusting the config first
pub(crate) async fn create_test_orchestrator_with(
    fake: FakeExtractor,
    adjust: impl FnOnce(&mut Config),
) -> TestSetup {
    build_test_orchestrator(fake, Arc::new(LocalStorage::new()), adjust).await
}

/// Build an online orchestrator over `fake` that publishes through `storage`
pub(crate) async fn create_test_orchestrator_with_storage(
    fake: FakeExtractor,
    storage: Arc<dyn ManagedStorage>,
) -> TestSetup {
    build_test_orchestrator(fake, storage, |_| {}).await
}

async fn build_test_orchestrator(
    fake: FakeExtractor,
    storage: Arc<dyn ManagedStorage>,
    adjust: impl FnOnce(&mut Config),
) -> TestSetup {
    let temp_dir = TempDir::new().unwrap();
    let library_path = temp_dir.path().join("library");
    std::fs::create_dir_all(&library_path).unwrap();

    let mut config = test_config(&temp_dir);
    adjust(&mut config);
    let staging_path = config.staging_dir.clone();

    let fake = Arc::new(fake);
    let connectivity = Arc::new(StaticConnectivity::online());
    let orchestrator =
        DownloadOrchestrator::new(config, fake.clone(), storage, connectivity.clone())
            .await
            .unwrap();

    TestSetup {
        orchestrator,
        fake,
        connectivity,
        library_path,
        staging_path,
        _temp_dir: temp_dir,
    }
}

/// Local storage that counts how often the library is enumerated
#[derive(Default)]
pub(crate) struct CountingStorage {
    inner: LocalStorage,
    enumerations: AtomicU32,
}

impl CountingStorage {
    pub(crate) fn enumerations(&self) -> u32 {
        self.enumerations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedStorage for CountingStorage {
    async fn enumerate(&self, dir: &DirectoryRef) -> Result<Vec<StorageEntry>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.inner.enumerate(dir).await
    }

    async fn create_file(
        &self,
        dir: &DirectoryRef,
        mime_type: &str,
        name: &str,
    ) -> Result<FileHandle> {
        self.inner.create_file(dir, mime_type, name).await
    }

    async fn open_write(&self, handle: &FileHandle) -> Result<StorageWriter> {
        self.inner.open_write(handle).await
    }

    async fn delete(&self, handle: &FileHandle) -> Result<bool> {
        self.inner.delete(handle).await
    }
}

/// Receive events until `Shutdown`, failing the test after 10 seconds
pub(crate) async fn events_until_shutdown(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for job events")
            .expect("event channel closed");
        let done = matches!(event, Event::Shutdown { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

//! Test configuration helpers for creating orchestrators over temp directories

use audio_dl::connectivity::StaticConnectivity;
use audio_dl::extractor::MediaExtractor;
use audio_dl::storage::LocalStorage;
use audio_dl::{Config, DirectoryRef, DownloadOrchestrator, PolitenessConfig, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Orchestrator plus the temp directory that backs it
pub struct TestLibrary {
    pub orchestrator: DownloadOrchestrator,
    pub library_path: PathBuf,
    pub staging_path: PathBuf,
    pub temp_dir: TempDir,
}

impl TestLibrary {
    /// Sorted names of the files in the library
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.library_path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Contents of one library file as text
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.library_path.join(name)).unwrap()
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

/// Config over `temp` with millisecond retries and no politeness delay
pub fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.library.library_dir = Some(DirectoryRef::new(
        temp.path().join("library").to_string_lossy(),
    ));
    config.staging_dir = temp.path().join("staging");
    config.retry.fetch_single = fast_policy(3);
    config.retry.fetch_playlist = fast_policy(3);
    config.retry.download_single = fast_policy(4);
    config.retry.download_playlist_track = fast_policy(3);
    config.politeness = PolitenessConfig {
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };
    config.tools.min_sleep_interval = 0;
    config.tools.max_sleep_interval = 0;
    config
}

/// Build an online orchestrator over a fresh temp library
pub async fn create_test_library(
    extractor: Arc<dyn MediaExtractor>,
    adjust: impl FnOnce(&mut Config),
) -> TestLibrary {
    let temp_dir = TempDir::new().unwrap();
    let library_path = temp_dir.path().join("library");
    std::fs::create_dir_all(&library_path).unwrap();

    let mut config = test_config(&temp_dir);
    adjust(&mut config);
    let staging_path = config.staging_dir.clone();

    let orchestrator = DownloadOrchestrator::new(
        config,
        extractor,
        Arc::new(LocalStorage::new()),
        Arc::new(StaticConnectivity::online()),
    )
    .await
    .unwrap();

    TestLibrary {
        orchestrator,
        library_path,
        staging_path,
        temp_dir,
    }
}

/// Whether a real yt-dlp binary is reachable through `PATH`
pub fn has_ytdlp() -> bool {
    which::which("yt-dlp").is_ok()
}

/// Skip the current test if yt-dlp is not installed
#[macro_export]
macro_rules! skip_if_no_ytdlp {
    () => {
        if !$crate::common::has_ytdlp() {
            eprintln!("Skipping test: yt-dlp not found in PATH");
            return;
        }
    };
}

//! How the engine picks its extraction tool
//!
//! Tests that touch `PATH` run serially; the process environment is shared by
//! every test in this binary.

mod common;

use audio_dl::extractor::{self, MediaExtractor, YtDlpCli};
use audio_dl::{DownloadRequest, JobOutcome, ToolConfig};
use serial_test::serial;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
#[serial]
fn test_explicit_path_is_used_without_search() {
    let config = ToolConfig {
        ytdlp_path: Some(PathBuf::from("/opt/tools/yt-dlp")),
        search_path: false,
        ..Default::default()
    };
    assert_eq!(extractor::from_config(&config).name(), "yt-dlp");
}

#[test]
#[serial]
fn test_search_disabled_falls_back_to_unavailable() {
    let config = ToolConfig {
        ytdlp_path: None,
        search_path: false,
        ..Default::default()
    };
    assert_eq!(extractor::from_config(&config).name(), "unavailable");
}

#[tokio::test]
#[serial]
async fn test_unavailable_tool_fails_the_job() {
    let extractor = extractor::from_config(&ToolConfig {
        ytdlp_path: None,
        search_path: false,
        ..Default::default()
    });
    let library = common::create_test_library(extractor, |_| {}).await;

    let handle = library
        .orchestrator
        .submit(DownloadRequest::new("https://youtu.be/abc"))
        .await
        .unwrap();

    match handle.wait().await {
        JobOutcome::Failed { error } => {
            assert!(error.starts_with("not supported"), "unexpected error: {}", error);
            assert!(error.contains("yt-dlp"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(library.files().is_empty());
}

#[cfg(unix)]
#[test]
#[serial]
fn test_binary_found_through_path() {
    let bin_dir = TempDir::new().unwrap();
    let script = common::install_fake_ytdlp(bin_dir.path(), "yt-dlp");
    let saved = std::env::var_os("PATH");

    // SAFETY: serialized with every other test in this binary, nothing else
    // reads the environment concurrently
    unsafe { std::env::set_var("PATH", bin_dir.path()) };
    let found = YtDlpCli::from_path();
    let picked = extractor::from_config(&ToolConfig::default());
    // SAFETY: as above
    unsafe {
        match &saved {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }
    }

    let found = found.expect("fake yt-dlp should be found");
    assert_eq!(found.binary_path(), script.as_path());
    assert_eq!(picked.name(), "yt-dlp");
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_discovered_binary_runs_jobs() {
    let bin_dir = TempDir::new().unwrap();
    let script = common::install_fake_ytdlp(bin_dir.path(), "yt-dlp");
    let extractor: Arc<dyn MediaExtractor> = extractor::from_config(&ToolConfig {
        ytdlp_path: Some(script),
        search_path: false,
        ..Default::default()
    });
    let library = common::create_test_library(extractor, |_| {}).await;

    let outcome = library
        .orchestrator
        .submit(DownloadRequest::new("https://youtu.be/abc"))
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(outcome, JobOutcome::Completed { .. }), "{:?}", outcome);
    assert_eq!(library.files(), vec![format!("{}.opus", common::FAKE_SINGLE_TITLE)]);
}

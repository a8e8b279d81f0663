//! CLI-based extractor using the external yt-dlp binary

use super::parser::{parse_info_json, parse_progress_line};
use super::request::ExtractRequest;
use super::traits::{ExecuteOutput, MediaExtractor, ProgressCallback, VideoInfo};
use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Extractor that shells out to `yt-dlp`
///
/// # Examples
///
/// ```no_run
/// use audio_dl::extractor::{MediaExtractor, YtDlpCli};
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let extractor = YtDlpCli::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let extractor = YtDlpCli::from_path().expect("yt-dlp not found in PATH");
/// assert_eq!(extractor.name(), "yt-dlp");
/// ```
pub struct YtDlpCli {
    binary_path: PathBuf,
    processes: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl YtDlpCli {
    /// Create an extractor for an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            processes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// Returns `None` if the binary is not found.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Binary this extractor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run_streaming(
        &self,
        request: &ExtractRequest,
        token: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> crate::Result<ExecuteOutput> {
        let mut child = self
            .command()
            .arg("--newline")
            .args(request.to_args())
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stderr was not captured".to_string()))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut collected = String::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(url = request.url(), "Killing yt-dlp on cancel");
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(Error::Cancelled);
                }
                line = lines.next_line() => match line? {
                    Some(line) => match parse_progress_line(&line) {
                        Some(tick) => {
                            if let Some(callback) = &progress {
                                callback(tick);
                            }
                        }
                        None => {
                            collected.push_str(&line);
                            collected.push('\n');
                        }
                    },
                    None => break,
                },
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(Error::ExternalTool(failure_message(&stderr, status)));
        }
        Ok(ExecuteOutput {
            stdout: collected,
            stderr,
        })
    }
}

// Prefer the tool's ERROR: lines, they carry the text the terminal classifier matches on
fn failure_message(stderr: &str, status: ExitStatus) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("yt-dlp exited with {}", status)
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl MediaExtractor for YtDlpCli {
    async fn get_info(&self, request: &ExtractRequest) -> crate::Result<VideoInfo> {
        let output = self
            .command()
            .arg("--dump-json")
            .args(request.to_args())
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(failure_message(&stderr, output.status)));
        }
        parse_info_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn execute(
        &self,
        request: &ExtractRequest,
        process_id: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> crate::Result<ExecuteOutput> {
        let token = CancellationToken::new();
        if let Some(id) = process_id {
            self.processes
                .lock()
                .await
                .insert(id.to_string(), token.clone());
        }

        let result = self.run_streaming(request, token, progress).await;

        if let Some(id) = process_id {
            self.processes.lock().await.remove(id);
        }
        result
    }

    async fn cancel(&self, process_id: &str) -> bool {
        match self.processes.lock().await.remove(process_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

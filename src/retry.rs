//! Retry logic with exponential backoff
//!
//! This module is the RetryExecutor every network-bound phase runs under. Each
//! failure is sorted into one of three buckets before anything else happens:
//!
//! - **terminal**: recognized from the tool's message (invalid URL, unavailable or
//!   private video) or inherently permanent; returned at once
//! - **retryable**: anything else; retried after a jittered exponential backoff
//!   until the policy's budget is spent, then reported as
//!   [`Error::RetriesExhausted`]
//! - **cancelled**: the job's token fired; returned as [`Error::Cancelled`] and
//!   never retried
//!
//! # Example
//!
//! ```no_run
//! use audio_dl::config::RetryPolicy;
//! use audio_dl::error::{Error, Phase};
//! use audio_dl::retry::run_with_retry;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let cancel = CancellationToken::new();
//! let title = run_with_retry(&policy, Phase::FetchInfo, &cancel, |_| {}, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, Error>("Song".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryPolicy;
use crate::error::{Error, Phase, Result, TerminalReason};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Failures of the extraction tool, staging I/O and storage writes are worth
/// another attempt. Precondition, terminal, configuration and metadata problems
/// are not: a retry would hit the same wall.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::ExternalTool(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::MalformedPlaylist(_)
            | Error::MissingOutput { .. }
            | Error::Storage(_) => true,
            Error::Precondition(_)
            | Error::Terminal(_)
            | Error::RetriesExhausted { .. }
            | Error::AlreadyExists { .. }
            | Error::InvalidMetadata(_)
            | Error::NotSupported(_)
            | Error::Config { .. }
            | Error::Cancelled => false,
        }
    }
}

/// Recognize the extraction tool's permanent failures from its message text
///
/// All message matching lives here so the rules can change without touching
/// the retry loop.
///
/// # Examples
///
/// ```
/// use audio_dl::error::TerminalReason;
/// use audio_dl::retry::classify_message;
///
/// assert_eq!(
///     classify_message("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
///     Some(TerminalReason::PrivateVideo)
/// );
/// assert_eq!(classify_message("HTTP Error 503: Service Unavailable"), None);
/// ```
#[must_use]
pub fn classify_message(message: &str) -> Option<TerminalReason> {
    if message.contains("not a valid URL") {
        Some(TerminalReason::InvalidUrl)
    } else if message.contains("Video unavailable") {
        Some(TerminalReason::VideoUnavailable)
    } else if message.contains("Private video") {
        Some(TerminalReason::PrivateVideo)
    } else {
        None
    }
}

/// Observations reported to the caller while an operation runs
#[derive(Debug)]
pub enum RetryEvent<'a> {
    /// Attempt `attempt` of `max_attempts` is about to start (1-indexed)
    Attempt {
        /// Current attempt
        attempt: u32,
        /// Attempt budget
        max_attempts: u32,
    },
    /// Attempt `attempt` failed and the next one starts after `delay`
    Failed {
        /// Failed attempt
        attempt: u32,
        /// Why it failed
        error: &'a Error,
        /// Backoff before the next attempt
        delay: Duration,
    },
}

enum Failure {
    Retryable(Error),
    Terminal(Error),
    Cancelled,
}

fn classify(error: Error, cancel: &CancellationToken) -> Failure {
    if cancel.is_cancelled() || error.is_cancelled() {
        return Failure::Cancelled;
    }
    if let Some(reason) = classify_message(&error.to_string()) {
        return Failure::Terminal(Error::Terminal(reason));
    }
    if error.is_retryable() {
        Failure::Retryable(error)
    } else {
        Failure::Terminal(error)
    }
}

/// Execute an async operation under a retry policy
///
/// `operation` receives the 1-indexed attempt number. `observer` sees every
/// attempt start and every retried failure, which is how callers surface
/// "Attempt n/max" style progress.
///
/// # Errors
///
/// - [`Error::Cancelled`] if `cancel` fires before an attempt, while one fails,
///   or during a backoff sleep
/// - [`Error::Terminal`] or any non-retryable error as soon as it happens
/// - [`Error::RetriesExhausted`] after the final attempt fails
pub async fn run_with_retry<T, F, Fut, O>(
    policy: &RetryPolicy,
    phase: Phase,
    cancel: &CancellationToken,
    mut observer: O,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    O: FnMut(RetryEvent<'_>),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        observer(RetryEvent::Attempt {
            attempt,
            max_attempts,
        });

        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(%phase, attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        match classify(error, cancel) {
            Failure::Cancelled => {
                tracing::debug!(%phase, attempt, "Operation cancelled");
                return Err(Error::Cancelled);
            }
            Failure::Terminal(e) => {
                tracing::error!(%phase, error = %e, "Operation failed with non-retryable error");
                return Err(e);
            }
            Failure::Retryable(e) if attempt >= max_attempts => {
                tracing::error!(
                    %phase,
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(Error::RetriesExhausted {
                    phase,
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
            Failure::Retryable(e) => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    %phase,
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                observer(RetryEvent::Failed {
                    attempt,
                    error: &e,
                    delay,
                });
                sleep_cancellable(delay, cancel).await?;
                attempt += 1;
            }
        }
    }
}

/// Backoff after failed attempt `attempt` (1-indexed)
///
/// `min(base * 2^attempt, max)`, plus up to half of that again when jitter is on.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    let delay = policy
        .base_delay
        .saturating_mul(factor)
        .min(policy.max_delay);
    if policy.jitter {
        add_jitter(delay)
    } else {
        delay
    }
}

/// Sleep for `duration` unless `cancel` fires first
///
/// # Errors
///
/// [`Error::Cancelled`] if the token fired before the sleep finished.
pub async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Drive `future` to completion unless `cancel` fires first
///
/// Dropping the future on cancellation also drops whatever it owns, which for
/// the CLI extractor kills the child process.
pub async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}

// Uniform extra of 0 to 50% of the delay, whole milliseconds
fn add_jitter(delay: Duration) -> Duration {
    let half_ms = (delay.as_millis() / 2) as u64;
    if half_ms == 0 {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0..=half_ms);
    delay + Duration::from_millis(extra)
}

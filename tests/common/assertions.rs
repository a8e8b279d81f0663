//! Event collection and assertion helpers

use audio_dl::{Event, JobState};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

/// Receive events until `Shutdown`, panicking after `timeout`
///
/// Lagging drops the oldest events only; the terminal events are still seen.
pub async fn collect_until_shutdown(rx: &mut Receiver<Event>, timeout: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = matches!(event, Event::Shutdown { .. });
                    events.push(event);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event stream ended early: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for Shutdown");
    events
}

/// States in the order they were entered
pub fn state_sequence(events: &[Event]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Assert the terminal contract: one outcome event, then exactly one `Shutdown` last
pub fn assert_single_terminal_then_shutdown(events: &[Event]) {
    let outcomes = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::Completed { .. } | Event::Failed { .. } | Event::Cancelled { .. }
            )
        })
        .count();
    let shutdowns = events
        .iter()
        .filter(|e| matches!(e, Event::Shutdown { .. }))
        .count();

    assert_eq!(outcomes, 1, "exactly one outcome event: {:?}", events);
    assert_eq!(shutdowns, 1, "exactly one Shutdown event: {:?}", events);
    assert!(matches!(events.last(), Some(Event::Shutdown { .. })));
    let n = events.len();
    assert!(
        n >= 2
            && matches!(
                events[n - 2],
                Event::Completed { .. } | Event::Failed { .. } | Event::Cancelled { .. }
            ),
        "the outcome event comes right before Shutdown"
    );
}

/// Progress detail lines, in order
pub fn progress_details(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { progress, .. } => Some(progress.detail.clone()),
            _ => None,
        })
        .collect()
}

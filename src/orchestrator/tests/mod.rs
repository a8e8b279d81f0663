use super::test_helpers::*;
use super::*;
use crate::error::PreconditionError;
use crate::types::{DownloadRequest, JobState, JobSummary};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;


const SINGLE_URL: &str = "https://www.youtube.com/watch?v=abc123";
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=PLtest";

/// Receive events until one matches `done`, returning everything seen
async fn recv_until(rx: &mut Receiver<Event>, done: impl Fn(&Event) -> bool) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        let matched = done(&event);
        events.push(event);
        if matched {
            return events;
        }
    }
}

fn states(events: &[Event]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn progress_details(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress { progress, .. } => Some(progress.detail.clone()),
            _ => None,
        })
        .collect()
}

fn published_titles(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::ItemPublished { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect()
}

/// Count of `Completed`, `Failed`, `Cancelled` and `Shutdown` events
fn terminal_counts(events: &[Event]) -> (usize, usize, usize, usize) {
    let count = |f: fn(&Event) -> bool| events.iter().filter(|e| f(e)).count();
    (
        count(|e| matches!(e, Event::Completed { .. })),
        count(|e| matches!(e, Event::Failed { .. })),
        count(|e| matches!(e, Event::Cancelled { .. })),
        count(|e| matches!(e, Event::Shutdown { .. })),
    )
}

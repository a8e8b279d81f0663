//! Parsers for yt-dlp output

use super::traits::{ToolProgress, VideoInfo};
use crate::error::{Error, Result};
use crate::types::TrackMetadata;
use crate::utils::sanitize_filename;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PROGRESS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%(?:.*?ETA\s+(\S+))?").ok()
});

/// Parse the JSON printed by `--dump-json`
///
/// The tool prints one object per line; only the first is used.
pub fn parse_info_json(stdout: &str) -> Result<VideoInfo> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| Error::ExternalTool("yt-dlp printed no info JSON".to_string()))?;
    Ok(serde_json::from_str(line)?)
}

/// Parse the single JSON document printed by `--dump-single-json --flat-playlist`
///
/// Entries without a usable title or URL are skipped, titles are sanitized,
/// and entries whose title sanitizes to nothing are skipped too. Listing order
/// is preserved, duplicates included.
///
/// # Errors
///
/// [`Error::MalformedPlaylist`] when the document has no `entries` array; a
/// malformed listing is never a partial result.
pub fn parse_flat_playlist(stdout: &str) -> Result<Vec<TrackMetadata>> {
    let document: Value = serde_json::from_str(stdout.trim())?;
    let entries = document
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedPlaylist("no entries array in playlist JSON".to_string()))?;

    let tracks = entries
        .iter()
        .filter_map(|entry| {
            let title = non_empty_str(entry, "title")?;
            let url = non_empty_str(entry, "url")?;
            let title = sanitize_filename(title);
            if title.is_empty() {
                return None;
            }
            Some(TrackMetadata {
                title,
                source_url: url.to_string(),
                uploader: non_empty_str(entry, "uploader").map(str::to_string),
            })
        })
        .collect();

    Ok(tracks)
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Parse a `[download]  42.0% of 3.2MiB at 1.1MiB/s ETA 00:02` line
///
/// Returns `None` for lines that are not percentage updates.
pub fn parse_progress_line(line: &str) -> Option<ToolProgress> {
    let captures = PROGRESS_RE.as_ref()?.captures(line.trim())?;
    let percent: f32 = captures.get(1)?.as_str().parse().ok()?;
    let eta_seconds = captures
        .get(2)
        .and_then(|eta| parse_eta(eta.as_str()))
        .unwrap_or(-1);

    Some(ToolProgress {
        percent,
        eta_seconds,
        line: line.to_string(),
    })
}

// "SS", "MM:SS" or "HH:MM:SS"; anything else ("Unknown", "NA") is unknown
fn parse_eta(eta: &str) -> Option<i64> {
    eta.split(':').try_fold(0i64, |total, part| {
        part.parse::<i64>().ok().map(|n| total * 60 + n)
    })
}

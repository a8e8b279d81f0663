//! Utility functions for titles, file names and MIME types

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of characters kept from a title
const MAX_TITLE_CHARS: usize = 250;

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// MIME type used by providers that cannot tell what a file is
pub const GENERIC_MIME: &str = "application/octet-stream";

/// Turn a display title into a name that is safe on every filesystem
///
/// Leading/trailing whitespace is trimmed, the title is cut to 250 characters,
/// control characters are dropped, and characters that are reserved on common
/// filesystems are swapped for visually similar Unicode ones, so the result
/// still reads like the original title.
///
/// The sanitized title is also the de-duplication key against the library.
///
/// # Examples
///
/// ```
/// use audio_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("  AC/DC: Live?  "), "AC／DC꞉ Live？");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    title
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '.' => '．',
            '/' => '／',
            '\\' => '＼',
            ':' => '꞉',
            '*' => '＊',
            '?' => '？',
            '"' => '＂',
            '<' => '‹',
            '>' => '›',
            '|' => '｜',
            ';' => ';',
            '\'' => '’',
            '&' => '＆',
            '#' => '＃',
            other => other,
        })
        .collect()
}

/// File name without its last extension, trimmed
#[must_use]
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => file_name[..idx].trim(),
        None => file_name,
    }
}

/// Lowercased extension of a file name, if it has a non-empty one
#[must_use]
pub fn extension_of(file_name: &str) -> Option<String> {
    let idx = file_name.rfind('.')?;
    let ext = &file_name[idx + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// Guess a MIME type from a file name's extension
#[must_use]
pub fn mime_for_name(file_name: &str) -> Option<&'static str> {
    let mime = match extension_of(file_name)?.as_str() {
        "opus" | "oga" | "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "m4b" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "wav" => "audio/x-wav",
        "webm" => "audio/webm",
        "mka" => "audio/x-matroska",
        "json" => "application/json",
        _ => return None,
    };
    Some(mime)
}

/// Whether a MIME type denotes audio
#[must_use]
pub fn is_audio_mime(mime: &str) -> bool {
    mime.starts_with("audio/")
}

/// Find a path that does not exist yet, appending ` (1)`, ` (2)`, ... to the stem
///
/// # Examples
///
/// ```
/// use audio_dl::utils::get_unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/audio-dl-doc-nonexistent/song.opus");
/// assert_eq!(get_unique_path(path).unwrap(), path);
/// ```
pub fn get_unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            Error::Storage(format!(
                "cannot extract file stem from {}",
                path.display()
            ))
        })?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().ok_or_else(|| {
        Error::Storage(format!(
            "cannot extract parent directory from {}",
            path.display()
        ))
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::Storage(format!(
        "could not find unique filename for {} after {} attempts",
        path.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

//! Request classification and the supported-platform allow-list

use serde::{Deserialize, Serialize};

/// URL path fragments that identify a playlist-like page
const PLAYLIST_PATTERNS: &[&str] = &[
    // YouTube, SoundCloud, Bandcamp
    "/playlist",
    // SoundCloud sets
    "/sets/",
    // Bandcamp albums
    "/album/",
    // Vimeo, Dailymotion
    "/channel/",
    // Twitch collections
    "/collections/",
    // Bilibili, Niconico
    "/series/",
];

/// Hosts accepted by [`is_supported_platform`]; subdomains match too
const SUPPORTED_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "soundcloud.com",
    "bandcamp.com",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "bilibili.com",
    "nicovideo.jp",
    "nico.ms",
];

/// How a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// One item, fetched with playlist expansion disabled
    Single,
    /// A listing whose entries are each downloaded
    Playlist,
}

impl RequestKind {
    /// Classify a URL by matching known playlist path shapes
    ///
    /// Matching is case-insensitive and purely textual; anything that is not
    /// recognized as a playlist is treated as a single item.
    ///
    /// # Examples
    ///
    /// ```
    /// use audio_dl::request::RequestKind;
    ///
    /// assert_eq!(
    ///     RequestKind::classify("https://soundcloud.com/artist/sets/mixtape"),
    ///     RequestKind::Playlist
    /// );
    /// assert_eq!(
    ///     RequestKind::classify("https://youtu.be/dQw4w9WgXcQ"),
    ///     RequestKind::Single
    /// );
    /// ```
    pub fn classify(url: &str) -> Self {
        let lower = url.to_lowercase();
        if PLAYLIST_PATTERNS.iter().any(|p| lower.contains(p)) {
            RequestKind::Playlist
        } else {
            RequestKind::Single
        }
    }
}

/// Whether the URL's host belongs to a supported media platform
///
/// Validation happens upstream of the orchestrator; this is exposed for that layer.
#[must_use]
pub fn is_supported_platform(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    SUPPORTED_HOSTS.iter().any(|allowed| {
        host == *allowed
            || host
                .strip_suffix(allowed)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

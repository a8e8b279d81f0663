//! Fake yt-dlp binary and canned tool output

use std::path::{Path, PathBuf};

/// Title the fake tool reports for any single item
pub const FAKE_SINGLE_TITLE: &str = "Shell Song";

/// Titles of the fake tool's playlist listing, in order
pub const FAKE_PLAYLIST_TITLES: &[&str] = &["First", "Second"];

/// Bytes the fake tool writes as "audio"
pub const FAKE_AUDIO: &str = "shell audio";

/// A POSIX shell stand-in for yt-dlp
///
/// Understands the flags the engine passes: `--dump-json` answers with info
/// JSON, `--flat-playlist` with a two-entry listing, and anything else is a
/// transfer that prints progress lines and writes the `-o` target. URLs
/// containing `private` fail with yt-dlp's private-video message, URLs
/// containing `slow` sleep before transferring.
pub const FAKE_YTDLP_SCRIPT: &str = r#"#!/bin/sh
mode=download
out=""
fmt="opus"
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    --dump-json) mode=info ;;
    --flat-playlist) mode=playlist ;;
    -o) shift; out="$1" ;;
    --audio-format) shift; fmt="$1" ;;
    --retries|--min-sleep-interval|--max-sleep-interval|--sleep-requests|--retry-sleep|--limit-rate|--compat-options|--parse-metadata) shift ;;
    *) url="$1" ;;
  esac
  shift
done

case "$url" in
  *private*)
    echo "WARNING: [youtube] checking access" >&2
    echo "ERROR: [youtube] private: Private video. Sign in if you've been granted access" >&2
    exit 1 ;;
esac

case "$mode" in
  info)
    echo '{"id":"shell","title":"Shell Song","uploader":"Shell Artist","webpage_url":"'"$url"'"}' ;;
  playlist)
    echo '{"_type":"playlist","title":"Mix","entries":[{"title":"First","url":"https://youtu.be/first"},{"title":"Second","url":"https://youtu.be/second"}]}' ;;
  download)
    case "$url" in
      *slow*) sleep 30 ;;
    esac
    echo "[download] Destination: $out"
    echo "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
    echo "[download] 100.0% of 1.00MiB at 1.00MiB/s ETA 00:00"
    target=$(printf '%s' "$out" | sed "s/%(ext)s/$fmt/")
    printf 'shell audio' > "$target" ;;
esac
"#;

/// Write the fake tool into `dir` under `name` and make it executable
#[cfg(unix)]
pub fn install_fake_ytdlp(dir: &Path, name: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, FAKE_YTDLP_SCRIPT).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

//! Playlist metadata extraction boundary.
//!
//! Given a playlist (or single-video) URL, the extractor returns an
//! ordered sequence of raw entries: source title, duration, watch URL and
//! playlist position. Extraction failure surfaces as an error at the
//! boundary; callers treat "zero entries" as the uniform empty/failure
//! signal and keep the session usable for a retry.
//!
//! The real implementation scrapes the playlist page's embedded
//! `ytInitialData` JSON for playlist entries, and uses `rusty_ytdl` for
//! single videos. No external tools are required.

use rusty_ytdl::Video;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// One raw playlist entry as returned by extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    /// Source title.
    pub title: String,
    /// Duration in seconds (0 when unknown).
    pub duration_secs: u64,
    /// Watch URL consumed by the fetch collaborator.
    pub webpage_url: String,
    /// One-based playlist position, when derived from a playlist.
    pub index: Option<u32>,
}

/// Metadata extraction collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataExtractor: Send + Sync {
    /// Fetch the ordered entry sequence for a playlist or single-item URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] if the URL cannot be resolved or the
    /// page cannot be parsed.
    fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>>;
}

/// Extractor backed by YouTube page scraping and `rusty_ytdl`.
#[derive(Debug, Default)]
pub struct RustyYtdlExtractor;

impl RustyYtdlExtractor {
    /// Create a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch_playlist_entries(playlist_id: &str) -> Result<Vec<RawEntry>> {
        let url = format!("https://www.youtube.com/playlist?list={playlist_id}");
        info!("Fetching playlist page: {}", url);

        let client = reqwest::blocking::Client::new();
        let response = client
            .get(&url)
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .map_err(|e| Error::Extraction(format!("failed to fetch playlist page: {e}")))?;

        let html = response
            .text()
            .map_err(|e| Error::Extraction(format!("failed to read playlist page: {e}")))?;

        let data = extract_yt_initial_data(&html)?;
        let entries = collect_playlist_entries(&data);

        if entries.is_empty() {
            warn!("No entries found in playlist {}", playlist_id);
        } else {
            info!("Extracted {} entries from playlist {}", entries.len(), playlist_id);
        }

        Ok(entries)
    }

    fn fetch_single_entry(url: &str) -> Result<Vec<RawEntry>> {
        debug!("Treating {} as a single video", url);
        let url_owned = url.to_string();

        let fetch = async move {
            let video = Video::new(url_owned.as_str())
                .map_err(|e| Error::Extraction(format!("failed to resolve video: {e}")))?;
            let info = video
                .get_info()
                .await
                .map_err(|e| Error::Extraction(format!("failed to get video info: {e}")))?;
            let details = &info.video_details;
            Ok::<_, Error>(RawEntry {
                title: details.title.clone(),
                duration_secs: details.length_seconds.parse().unwrap_or(0),
                webpage_url: format!("https://www.youtube.com/watch?v={}", details.video_id),
                index: None,
            })
        };

        // rusty_ytdl is async-only; bridge from this blocking context the
        // same way whether or not a runtime already exists.
        let entry = if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(fetch))?
        } else {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| Error::Extraction(format!("failed to create runtime: {e}")))?;
            rt.block_on(fetch)?
        };

        Ok(vec![entry])
    }
}

impl MetadataExtractor for RustyYtdlExtractor {
    fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>> {
        match extract_playlist_id(url) {
            Some(playlist_id) => Self::fetch_playlist_entries(&playlist_id),
            None => Self::fetch_single_entry(url),
        }
    }
}

/// Extract the `list=` query parameter from a URL, if present.
#[must_use]
pub fn extract_playlist_id(url: &str) -> Option<String> {
    // Anchor on a parameter boundary so e.g. `wishlist=` does not match;
    // byte-wise ASCII matching keeps the offsets valid for slicing.
    let pos = url.as_bytes().windows(6).position(|window| {
        (window[0] == b'?' || window[0] == b'&')
            && window[1..].eq_ignore_ascii_case(b"list=")
    })?;
    let rest = &url[pos + 6..];
    let end = rest.find(['&', '#']).unwrap_or(rest.len());
    let id = rest[..end].trim();
    if id.is_empty() { None } else { Some(id.to_string()) }
}

/// Locate and parse the `ytInitialData` JSON blob embedded in a page.
fn extract_yt_initial_data(html: &str) -> Result<serde_json::Value> {
    let start = html
        .find("var ytInitialData = ")
        .map(|p| p + "var ytInitialData = ".len())
        .or_else(|| {
            html.find("ytInitialData = ")
                .map(|p| p + "ytInitialData = ".len())
        })
        .ok_or_else(|| Error::Extraction("ytInitialData not found in page".to_string()))?;

    let bytes = &html.as_bytes()[start..];
    if bytes.first() != Some(&b'{') {
        return Err(Error::Extraction(
            "ytInitialData does not start with '{'".to_string(),
        ));
    }

    // Balance braces, skipping string literals.
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if end == 0 {
        return Err(Error::Extraction(
            "unterminated ytInitialData JSON".to_string(),
        ));
    }

    serde_json::from_str(&html[start..start + end])
        .map_err(|e| Error::Extraction(format!("failed to parse ytInitialData: {e}")))
}

/// Walk the page data for the playlist video list and build raw entries.
fn collect_playlist_entries(data: &serde_json::Value) -> Vec<RawEntry> {
    let Some(contents) = find_key(data, "playlistVideoListRenderer")
        .and_then(|v| v.get("contents"))
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for item in contents {
        let Some(renderer) = item.get("playlistVideoRenderer") else {
            continue;
        };
        let Some(video_id) = renderer.get("videoId").and_then(|v| v.as_str()) else {
            continue;
        };
        let title = renderer
            .get("title")
            .and_then(|t| t.get("runs"))
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|r| r.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or("Unknown Title")
            .to_string();
        let duration_secs = renderer
            .get("lengthSeconds")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        entries.push(RawEntry {
            title,
            duration_secs,
            webpage_url: format!("https://www.youtube.com/watch?v={video_id}"),
            index: Some(entries.len() as u32 + 1),
        });
    }

    entries
}

/// Depth-first search for the first object under the given key.
fn find_key<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        serde_json::Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

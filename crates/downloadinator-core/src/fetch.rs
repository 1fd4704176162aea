//! Audio fetch boundary.
//!
//! A fetcher retrieves one track's audio to a destination file and reports
//! progress through a one-way event stream. The three event kinds mirror
//! the states the queue controller maps onto each track: `downloading`
//! (bytes transferred plus a known or unknown total), `finished` (audio
//! retrieved, tagging about to start) and `error` (fetch failed).
//!
//! Implementations emit only `Downloading` events themselves; the worker
//! that owns the call translates the terminal `Result` into exactly one
//! `Finished` or `Error` event. Once dispatched, a fetch runs to
//! completion or failure; there is no abort and no timeout.

use std::io::Write;
use std::path::{Path, PathBuf};

use rusty_ytdl::{Video, VideoOptions, VideoQuality, VideoSearchOptions};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::tags::OutputContainer;

/// Progress event for one track's fetch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Bytes are being transferred.
    Downloading {
        /// Bytes downloaded so far.
        bytes: u64,
        /// Total bytes, when the collaborator knows it.
        total: Option<u64>,
    },
    /// Audio retrieved; tagging is about to start.
    Finished {
        /// Path of the written audio file.
        path: PathBuf,
    },
    /// Fetch failed.
    Error {
        /// Failure reason.
        reason: String,
    },
}

/// One-way progress observer, called from the worker that runs the fetch.
pub type FetchObserver = Box<dyn Fn(FetchEvent) + Send + Sync>;

/// Audio fetch collaborator.
pub trait AudioFetcher: Send + Sync {
    /// Retrieve the audio for `source_url` into `dest_dir`, naming the file
    /// from `base_name` plus the fetcher's container extension.
    ///
    /// Emits zero or more `Downloading` events through `observer` while
    /// streaming, then returns the written path. The caller owns the
    /// terminal event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the audio cannot be retrieved.
    fn fetch(
        &self,
        source_url: &str,
        dest_dir: &Path,
        base_name: &str,
        observer: &FetchObserver,
    ) -> Result<PathBuf>;
}

/// Fetcher backed by `rusty_ytdl` chunked streaming.
#[derive(Debug)]
pub struct RustyYtdlFetcher {
    container: OutputContainer,
}

impl RustyYtdlFetcher {
    /// Create a fetcher writing files with the given container's extension.
    #[must_use]
    pub const fn new(container: OutputContainer) -> Self {
        Self { container }
    }

    async fn fetch_async(
        source_url: &str,
        output_path: &Path,
        observer: &FetchObserver,
    ) -> Result<()> {
        let title = output_path.display().to_string();
        let fetch_err = |reason: String| Error::Fetch {
            title: title.clone(),
            reason,
        };

        // Audio-only streams often get 403 responses; the combined
        // video+audio stream at lowest quality is the reliable choice.
        let options = VideoOptions {
            quality: VideoQuality::Lowest,
            filter: VideoSearchOptions::VideoAudio,
            ..Default::default()
        };

        let video = Video::new_with_options(source_url, options)
            .map_err(|e| fetch_err(format!("failed to resolve video: {e}")))?;

        let stream = video
            .stream()
            .await
            .map_err(|e| fetch_err(format!("failed to open stream: {e}")))?;

        let content_length = stream.content_length() as u64;
        let total = (content_length > 0).then_some(content_length);
        debug!("Stream content length: {:?} bytes", total);

        let mut file = std::fs::File::create(output_path)
            .map_err(|e| fetch_err(format!("failed to create file: {e}")))?;

        let mut bytes = 0u64;
        while let Some(chunk) = stream
            .chunk()
            .await
            .map_err(|e| fetch_err(format!("failed to download chunk: {e}")))?
        {
            bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .map_err(|e| fetch_err(format!("failed to write chunk: {e}")))?;
            observer(FetchEvent::Downloading { bytes, total });
        }

        info!("Downloaded {} bytes to {}", bytes, output_path.display());
        Ok(())
    }
}

impl AudioFetcher for RustyYtdlFetcher {
    fn fetch(
        &self,
        source_url: &str,
        dest_dir: &Path,
        base_name: &str,
        observer: &FetchObserver,
    ) -> Result<PathBuf> {
        let file_name = format!(
            "{}.{}",
            sanitize_filename(base_name),
            self.container.extension()
        );
        let output_path = dest_dir.join(file_name);

        // rusty_ytdl is async-only; bridge from this blocking context the
        // same way whether or not a runtime already exists.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| {
                handle.block_on(Self::fetch_async(source_url, &output_path, observer))
            })?;
        } else {
            let rt = tokio::runtime::Runtime::new().map_err(|e| Error::Fetch {
                title: base_name.to_string(),
                reason: format!("failed to create runtime: {e}"),
            })?;
            rt.block_on(Self::fetch_async(source_url, &output_path, observer))?;
        }

        Ok(output_path)
    }
}

/// Sanitize a string for use as a filename.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let invalid = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
    let sanitized: String = name
        .chars()
        .map(|c| if invalid.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');

    // Cap at 200 bytes without splitting a multi-byte character
    let mut end = trimmed.len().min(200);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Song A / B: C?"), "Song A _ B_ C_");
        assert_eq!(sanitize_filename("  plain title  "), "plain title");
        assert_eq!(sanitize_filename("...dots..."), "dots");
    }

    #[test]
    fn test_sanitize_filename_length_cap() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 200);
    }

    #[test]
    fn test_sanitize_filename_truncates_on_char_boundary() {
        // 100 three-byte characters; a byte-index cut at 200 would split one
        let long = "あ".repeat(100);
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.len() <= 200);
        assert_eq!(sanitized.chars().count(), 66);
        assert!(sanitized.chars().all(|c| c == 'あ'));
    }

    #[test]
    fn test_fetch_event_equality() {
        let a = FetchEvent::Downloading {
            bytes: 10,
            total: Some(100),
        };
        let b = FetchEvent::Downloading {
            bytes: 10,
            total: Some(100),
        };
        assert_eq!(a, b);
    }
}

//! Track records: one playlist entry plus user-editable metadata and
//! live download status.
//!
//! A [`TrackRecord`] is created once metadata extraction returns an entry
//! (or once a saved session is loaded) and lives for the duration of the
//! session. The preview step mutates its editable fields; the download
//! step mutates only status and progress.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::RawEntry;

/// One-based track numbering within an album.
///
/// `(0, 0)` is the sentinel for "no numbering metadata"; tag writers skip
/// the track frame entirely when they see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrackIndex {
    /// One-based position within the album.
    pub position: u32,
    /// Total track count of the album at creation time.
    pub total: u32,
}

impl TrackIndex {
    /// Sentinel index meaning "no numbering metadata".
    pub const NONE: Self = Self {
        position: 0,
        total: 0,
    };

    /// Check whether this index carries real numbering metadata.
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.position != 0 && self.total != 0
    }
}

impl std::fmt::Display for TrackIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_set() {
            write!(f, "{}/{}", self.position, self.total)
        } else {
            write!(f, "-")
        }
    }
}

/// Per-track download status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// No operation has been dispatched for this track.
    #[default]
    Idle,
    /// Audio is being retrieved.
    Downloading,
    /// Audio retrieved, tags being written.
    Processing,
    /// Fetch and tag both succeeded.
    Done,
    /// Fetch or tag failed. Terminal; the sequential cursor still advances.
    Error,
}

impl TrackStatus {
    /// Check whether this status ends a track's active operation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Downloading => write!(f, "Downloading"),
            Self::Processing => write!(f, "Processing"),
            Self::Done => write!(f, "Done"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Album-wide fields copied onto every track during a preview pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumFields {
    /// Artist applied to every track.
    pub artist: String,
    /// Album name applied to every track.
    pub album: String,
    /// Release year applied to every track.
    pub year: String,
    /// Genre applied to every track.
    pub genre: String,
    /// Cover-art image shared across the album.
    pub album_art_path: Option<PathBuf>,
    /// Regex with at least one capture group used to derive clean titles.
    pub title_pattern: String,
}

/// One playlist entry's fields and user edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackRecord {
    /// Source title as returned by extraction. Immutable.
    pub raw_title: String,
    /// Display title. Initialized from `raw_title`, overwritten by the
    /// title normalizer when the pattern matches. Never empty.
    pub title: String,
    /// Artist, copied from the album fields at preview time.
    pub artist: String,
    /// Album, copied from the album fields at preview time.
    pub album: String,
    /// Year, copied from the album fields at preview time.
    pub year: String,
    /// Genre, copied from the album fields at preview time.
    pub genre: String,
    /// Cover-art image path shared across the album.
    pub album_art_path: Option<PathBuf>,
    /// Track duration in seconds.
    pub duration_secs: u64,
    /// Opaque locator consumed by the fetch collaborator. Immutable.
    pub source_url: String,
    /// One-based track numbering.
    pub index: TrackIndex,
    /// Live download status.
    pub status: TrackStatus,
    /// `(current, total)` progress pair. Bytes while downloading, `(0, 0)`
    /// while indeterminate, `(0, 1)` after a fetch error (full red bar).
    pub progress: (u64, u64),
}

impl TrackRecord {
    /// Build a track record from an extraction entry.
    ///
    /// `position` and `total` are the one-based track number and the album
    /// track count. There are no implicit defaults: every construction site
    /// supplies the extraction entry explicitly.
    #[must_use]
    pub fn from_entry(entry: &RawEntry, position: u32, total: u32) -> Self {
        Self {
            raw_title: entry.title.clone(),
            title: entry.title.clone(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            genre: String::new(),
            album_art_path: None,
            duration_secs: entry.duration_secs,
            source_url: entry.webpage_url.clone(),
            index: TrackIndex { position, total },
            status: TrackStatus::Idle,
            progress: (0, 0),
        }
    }

    /// Copy the album-wide fields onto this track.
    ///
    /// Called during the preview pass; does not touch the title (the
    /// normalizer owns that) nor status or progress.
    pub fn apply_album_fields(&mut self, fields: &AlbumFields) {
        self.artist = fields.artist.clone();
        self.album = fields.album.clone();
        self.year = fields.year.clone();
        self.genre = fields.genre.clone();
        self.album_art_path = fields.album_art_path.clone();
    }

    /// Check whether this track's operation has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Format the duration as MM:SS (or H:MM:SS).
    #[must_use]
    pub fn readable_duration(&self) -> String {
        let hours = self.duration_secs / 3600;
        let minutes = (self.duration_secs % 3600) / 60;
        let seconds = self.duration_secs % 60;
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, duration: u64, url: &str) -> RawEntry {
        RawEntry {
            title: title.to_string(),
            duration_secs: duration,
            webpage_url: url.to_string(),
            index: None,
        }
    }

    #[test]
    fn test_from_entry_initializes_title_from_raw() {
        let track = TrackRecord::from_entry(&entry("Song A - X", 120, "u1"), 1, 3);
        assert_eq!(track.raw_title, "Song A - X");
        assert_eq!(track.title, "Song A - X");
        assert_eq!(track.source_url, "u1");
        assert_eq!(track.index, TrackIndex { position: 1, total: 3 });
        assert_eq!(track.status, TrackStatus::Idle);
        assert_eq!(track.progress, (0, 0));
    }

    #[test]
    fn test_index_sentinel() {
        assert!(!TrackIndex::NONE.is_set());
        assert!(TrackIndex { position: 2, total: 10 }.is_set());
        assert_eq!(TrackIndex { position: 2, total: 10 }.to_string(), "2/10");
        assert_eq!(TrackIndex::NONE.to_string(), "-");
    }

    #[test]
    fn test_apply_album_fields() {
        let mut track = TrackRecord::from_entry(&entry("Song", 60, "u"), 1, 1);
        let fields = AlbumFields {
            artist: "Capcom".to_string(),
            album: "Spirit of Justice".to_string(),
            year: "2016".to_string(),
            genre: "Soundtrack".to_string(),
            album_art_path: Some(PathBuf::from("/art/cover.jpg")),
            title_pattern: String::new(),
        };
        track.apply_album_fields(&fields);
        assert_eq!(track.artist, "Capcom");
        assert_eq!(track.album, "Spirit of Justice");
        assert_eq!(track.year, "2016");
        assert_eq!(track.album_art_path, Some(PathBuf::from("/art/cover.jpg")));
        // Title and status are untouched
        assert_eq!(track.title, "Song");
        assert_eq!(track.status, TrackStatus::Idle);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TrackStatus::Done.is_terminal());
        assert!(TrackStatus::Error.is_terminal());
        assert!(!TrackStatus::Idle.is_terminal());
        assert!(!TrackStatus::Downloading.is_terminal());
        assert!(!TrackStatus::Processing.is_terminal());
    }

    #[test]
    fn test_readable_duration() {
        let track = TrackRecord::from_entry(&entry("Song", 185, "u"), 1, 1);
        assert_eq!(track.readable_duration(), "3:05");

        let long = TrackRecord::from_entry(&entry("Song", 3750, "u"), 1, 1);
        assert_eq!(long.readable_duration(), "1:02:30");
    }
}

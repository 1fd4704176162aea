//! Session documents: JSON save/load of an editing session.
//!
//! A session document persists the playlist URL, the album-wide fields and
//! the ordered track list reduced to its extraction-derived subset (source
//! title, duration, source URL, index position). Derived fields - the
//! normalized title, status, progress - are intentionally not persisted;
//! the next preview pass recomputes them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::track::{AlbumFields, TrackIndex, TrackRecord, TrackStatus};

/// One persisted track entry: the extraction-derived subset only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTrack {
    /// Source title.
    pub title: String,
    /// Duration in seconds.
    pub duration: u64,
    /// Source URL.
    pub webpage_url: String,
    /// One-based position (0 = no numbering metadata).
    pub index: u32,
}

/// Serializable snapshot of one editing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDocument {
    /// Playlist URL the session was built from.
    pub playlist_url: String,
    /// Title pattern string.
    pub title_pattern: String,
    /// Album-wide artist.
    pub artist: String,
    /// Album-wide album name.
    pub album: String,
    /// Album-wide year.
    pub year: String,
    /// Album-wide cover art path.
    pub album_art_path: Option<PathBuf>,
    /// Ordered track list.
    pub tracks: Vec<SessionTrack>,
}

impl SessionDocument {
    /// Build a document from the current album fields and track list.
    #[must_use]
    pub fn from_tracks(
        playlist_url: impl Into<String>,
        fields: &AlbumFields,
        tracks: &[TrackRecord],
    ) -> Self {
        Self {
            playlist_url: playlist_url.into(),
            title_pattern: fields.title_pattern.clone(),
            artist: fields.artist.clone(),
            album: fields.album.clone(),
            year: fields.year.clone(),
            album_art_path: fields.album_art_path.clone(),
            tracks: tracks
                .iter()
                .map(|t| SessionTrack {
                    title: t.raw_title.clone(),
                    duration: t.duration_secs,
                    webpage_url: t.source_url.clone(),
                    index: t.index.position,
                })
                .collect(),
        }
    }

    /// Reconstruct the album-wide fields from this document.
    ///
    /// Genre is not part of the persisted shape; it comes back empty.
    #[must_use]
    pub fn album_fields(&self) -> AlbumFields {
        AlbumFields {
            artist: self.artist.clone(),
            album: self.album.clone(),
            year: self.year.clone(),
            genre: String::new(),
            album_art_path: self.album_art_path.clone(),
            title_pattern: self.title_pattern.clone(),
        }
    }

    /// Rebuild the track record list from the persisted entries.
    ///
    /// Index pairs are regenerated from the persisted position and the
    /// list length; a zero position keeps the "no numbering" sentinel.
    #[must_use]
    pub fn into_tracks(self) -> Vec<TrackRecord> {
        let total = self.tracks.len() as u32;
        self.tracks
            .into_iter()
            .map(|t| TrackRecord {
                raw_title: t.title.clone(),
                title: t.title,
                artist: String::new(),
                album: String::new(),
                year: String::new(),
                genre: String::new(),
                album_art_path: None,
                duration_secs: t.duration,
                source_url: t.webpage_url,
                index: if t.index == 0 {
                    TrackIndex::NONE
                } else {
                    TrackIndex {
                        position: t.index,
                        total,
                    }
                },
                status: TrackStatus::Idle,
                progress: (0, 0),
            })
            .collect()
    }

    /// Save the document as UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::Session(format!("failed to write {}: {e}", path.display())))?;
        info!("Saved session to {}", path.display());
        Ok(())
    }

    /// Load a document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the file cannot be read, or
    /// [`Error::Serialization`] if it is not a valid session document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Session(format!("failed to read {}: {e}", path.display())))?;
        let document: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded session from {} ({} tracks)",
            path.display(),
            document.tracks.len()
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawEntry;
    use tempfile::TempDir;

    fn sample_fields() -> AlbumFields {
        AlbumFields {
            artist: "Capcom".to_string(),
            album: "Spirit of Justice".to_string(),
            year: "2016".to_string(),
            genre: "Soundtrack".to_string(),
            album_art_path: Some(PathBuf::from("/art/cover.jpg")),
            title_pattern: r"(.*)\s*-".to_string(),
        }
    }

    fn sample_tracks() -> Vec<TrackRecord> {
        let entries = [
            ("Song A - X", 120, "u1"),
            ("Song B - Y", 90, "u2"),
            ("Song C", 60, "u3"),
        ];
        entries
            .iter()
            .enumerate()
            .map(|(i, (title, duration, url))| {
                let entry = RawEntry {
                    title: (*title).to_string(),
                    duration_secs: *duration,
                    webpage_url: (*url).to_string(),
                    index: None,
                };
                TrackRecord::from_entry(&entry, i as u32 + 1, 3)
            })
            .collect()
    }

    #[test]
    fn test_round_trip_reproduces_album_fields_and_tracks() {
        let fields = sample_fields();
        let mut tracks = sample_tracks();
        // User edits that must NOT be persisted per-track
        tracks[0].title = "Song A".to_string();
        tracks[0].status = TrackStatus::Done;

        let document = SessionDocument::from_tracks("https://playlist", &fields, &tracks);
        let json = serde_json::to_string(&document).unwrap();
        let restored: SessionDocument = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.playlist_url, "https://playlist");
        assert_eq!(restored.title_pattern, fields.title_pattern);
        assert_eq!(restored.artist, fields.artist);
        assert_eq!(restored.album, fields.album);
        assert_eq!(restored.year, fields.year);
        assert_eq!(restored.album_art_path, fields.album_art_path);

        let rebuilt = restored.into_tracks();
        assert_eq!(rebuilt.len(), 3);
        for (rebuilt, original) in rebuilt.iter().zip(&tracks) {
            assert_eq!(rebuilt.source_url, original.source_url);
            assert_eq!(rebuilt.raw_title, original.raw_title);
            assert_eq!(rebuilt.duration_secs, original.duration_secs);
            assert_eq!(rebuilt.index.position, original.index.position);
        }
        // Derived fields are recomputed, not persisted
        assert_eq!(rebuilt[0].title, "Song A - X");
        assert_eq!(rebuilt[0].status, TrackStatus::Idle);
    }

    #[test]
    fn test_index_regeneration_from_list_length() {
        let document = SessionDocument {
            playlist_url: String::new(),
            title_pattern: String::new(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            album_art_path: None,
            tracks: vec![
                SessionTrack {
                    title: "A".to_string(),
                    duration: 1,
                    webpage_url: "u1".to_string(),
                    index: 1,
                },
                SessionTrack {
                    title: "B".to_string(),
                    duration: 2,
                    webpage_url: "u2".to_string(),
                    index: 0,
                },
            ],
        };

        let tracks = document.into_tracks();
        assert_eq!(tracks[0].index, TrackIndex { position: 1, total: 2 });
        assert_eq!(tracks[1].index, TrackIndex::NONE);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let document =
            SessionDocument::from_tracks("https://playlist", &sample_fields(), &sample_tracks());
        document.save(&path).unwrap();

        let loaded = SessionDocument::load(&path).unwrap();
        assert_eq!(loaded, document);
    }

    #[test]
    fn test_load_malformed_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = SessionDocument::load(&path);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SessionDocument::load(Path::new("/nonexistent/session.json"));
        assert!(matches!(result, Err(Error::Session(_))));
    }
}

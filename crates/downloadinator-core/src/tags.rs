//! Tag writing for downloaded audio files.
//!
//! After a fetch finishes, the controller invokes a tag-writing step
//! against the produced file: title, artist, album, year, genre, the
//! one-based track index with total, and an optional cover image. The tag
//! schema follows the session's output container: ID3v2.4 for mp3 (the
//! `id3` crate), MP4 ilst atoms for m4a (the `lofty` crate).
//!
//! Tag failures are guarded: they surface as [`Error::TagWrite`] so the
//! controller can mark the track `Error` instead of losing the failure.

use std::path::Path;

use id3::TagLike;
use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::tag::{Tag as LoftyTag, TagType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::track::TrackRecord;

/// Target audio container for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputContainer {
    /// MP3 with ID3v2.4 tags.
    #[default]
    Mp3,
    /// MPEG-4 audio with ilst tags.
    M4a,
}

impl OutputContainer {
    /// File extension for this container.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
        }
    }
}

impl std::fmt::Display for OutputContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Tag-writing collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait TagWriter: Send + Sync {
    /// Write the track's metadata tags onto the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagWrite`] if the tags cannot be written.
    fn write(&self, path: &Path, track: &TrackRecord) -> Result<()>;
}

/// Tag writer selecting the schema from the session's container.
#[derive(Debug, Default)]
pub struct ContainerTagWriter {
    container: OutputContainer,
}

impl ContainerTagWriter {
    /// Create a tag writer for the given container.
    #[must_use]
    pub const fn new(container: OutputContainer) -> Self {
        Self { container }
    }

    fn write_id3(path: &Path, track: &TrackRecord) -> Result<()> {
        let tag_err = |reason: String| Error::TagWrite {
            path: path.to_path_buf(),
            reason,
        };

        let mut tag = id3::Tag::new();
        tag.set_title(&track.title);
        tag.set_artist(&track.artist);
        tag.set_album(&track.album);
        if !track.genre.is_empty() {
            tag.set_genre(&track.genre);
        }
        if let Ok(year) = track.year.parse::<i32>() {
            tag.set_year(year);
        }
        if track.index.is_set() {
            tag.set_track(track.index.position);
            tag.set_total_tracks(track.index.total);
        }

        if let Some(art_path) = &track.album_art_path {
            let data = std::fs::read(art_path)
                .map_err(|e| tag_err(format!("failed to read cover art: {e}")))?;
            let _ = tag.add_frame(id3::frame::Picture {
                mime_type: image_mime(art_path).to_string(),
                picture_type: id3::frame::PictureType::CoverFront,
                description: String::new(),
                data,
            });
        }

        tag.write_to_path(path, id3::Version::Id3v24)
            .map_err(|e| tag_err(format!("failed to write ID3 tag: {e}")))
    }

    fn write_mp4(path: &Path, track: &TrackRecord) -> Result<()> {
        let tag_err = |reason: String| Error::TagWrite {
            path: path.to_path_buf(),
            reason,
        };

        let mut tag = LoftyTag::new(TagType::Mp4Ilst);
        tag.set_title(track.title.clone());
        tag.set_artist(track.artist.clone());
        tag.set_album(track.album.clone());
        if !track.genre.is_empty() {
            tag.set_genre(track.genre.clone());
        }
        if let Ok(year) = track.year.parse::<u32>() {
            tag.set_year(year);
        }
        if track.index.is_set() {
            tag.set_track(track.index.position);
            tag.set_track_total(track.index.total);
        }

        if let Some(art_path) = &track.album_art_path {
            let data = std::fs::read(art_path)
                .map_err(|e| tag_err(format!("failed to read cover art: {e}")))?;
            tag.push_picture(lofty::picture::Picture::new_unchecked(
                lofty::picture::PictureType::CoverFront,
                Some(lofty_mime(art_path)),
                None,
                data,
            ));
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| tag_err(format!("failed to write MP4 tag: {e}")))
    }
}

impl TagWriter for ContainerTagWriter {
    fn write(&self, path: &Path, track: &TrackRecord) -> Result<()> {
        debug!(
            "Writing {} tags for '{}' to {}",
            self.container,
            track.title,
            path.display()
        );
        match self.container {
            OutputContainer::Mp3 => Self::write_id3(path, track),
            OutputContainer::M4a => Self::write_mp4(path, track),
        }
    }
}

/// Guess a cover image MIME type from its extension.
fn image_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

fn lofty_mime(path: &Path) -> lofty::picture::MimeType {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => lofty::picture::MimeType::Png,
        _ => lofty::picture::MimeType::Jpeg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawEntry;
    use crate::track::TrackIndex;
    use std::fs;
    use tempfile::TempDir;

    fn test_track() -> TrackRecord {
        let entry = RawEntry {
            title: "Song A - X".to_string(),
            duration_secs: 120,
            webpage_url: "u1".to_string(),
            index: None,
        };
        let mut track = TrackRecord::from_entry(&entry, 1, 3);
        track.title = "Song A".to_string();
        track.artist = "Capcom".to_string();
        track.album = "Spirit of Justice".to_string();
        track.year = "2016".to_string();
        track.genre = "Soundtrack".to_string();
        track
    }

    #[test]
    fn test_container_extension() {
        assert_eq!(OutputContainer::Mp3.extension(), "mp3");
        assert_eq!(OutputContainer::M4a.extension(), "m4a");
    }

    #[test]
    fn test_container_serde() {
        let json = serde_json::to_string(&OutputContainer::M4a).unwrap();
        assert_eq!(json, "\"m4a\"");
        let parsed: OutputContainer = serde_json::from_str("\"mp3\"").unwrap();
        assert_eq!(parsed, OutputContainer::Mp3);
    }

    #[test]
    fn test_write_and_read_id3_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, [0xFF, 0xFB, 0x90, 0x00, 0x00, 0x00]).unwrap();

        let writer = ContainerTagWriter::new(OutputContainer::Mp3);
        writer.write(&path, &test_track()).unwrap();

        let tag = id3::Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song A"));
        assert_eq!(tag.artist(), Some("Capcom"));
        assert_eq!(tag.album(), Some("Spirit of Justice"));
        assert_eq!(tag.year(), Some(2016));
        assert_eq!(tag.track(), Some(1));
        assert_eq!(tag.total_tracks(), Some(3));
    }

    #[test]
    fn test_index_sentinel_skips_track_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, [0xFF, 0xFB, 0x90, 0x00]).unwrap();

        let mut track = test_track();
        track.index = TrackIndex::NONE;
        let writer = ContainerTagWriter::new(OutputContainer::Mp3);
        writer.write(&path, &track).unwrap();

        let tag = id3::Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.track(), None);
    }

    #[test]
    fn test_missing_cover_art_is_a_tag_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, [0xFF, 0xFB, 0x90, 0x00]).unwrap();

        let mut track = test_track();
        track.album_art_path = Some(dir.path().join("missing.jpg"));
        let writer = ContainerTagWriter::new(OutputContainer::Mp3);
        let result = writer.write(&path, &track);
        assert!(matches!(result, Err(Error::TagWrite { .. })));
    }

    #[test]
    fn test_mp4_write_to_invalid_file_is_a_tag_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.m4a");
        fs::write(&path, b"not an mp4 file").unwrap();

        let writer = ContainerTagWriter::new(OutputContainer::M4a);
        let result = writer.write(&path, &test_track());
        assert!(matches!(result, Err(Error::TagWrite { .. })));
    }

    #[test]
    fn test_image_mime_guess() {
        assert_eq!(image_mime(Path::new("cover.PNG")), "image/png");
        assert_eq!(image_mime(Path::new("cover.jpg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("cover")), "image/jpeg");
    }
}

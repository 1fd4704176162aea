//! Title normalizer.
//!
//! Derives a clean display title from a raw source title by applying a
//! user-supplied regex. The match is anchored at the start of the raw
//! title (the pattern does not need a leading `^`), and capture group 1
//! becomes the new title. A non-match, or a pattern without capture
//! groups, leaves the title unchanged and is reported as a non-fatal
//! diagnostic.

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::track::TrackRecord;

/// A compiled title pattern.
///
/// Always applied against `raw_title`, never against the current title, so
/// repeated preview passes are idempotent.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    regex: Regex,
}

impl TitlePattern {
    /// Compile a title pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the regex does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        // Anchor at the start; the non-capturing wrapper keeps the user's
        // group numbering intact.
        let regex = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }

    /// Apply the pattern to one track.
    ///
    /// On a successful match with a non-empty first capture group, the
    /// track's `title` becomes that capture. Otherwise the title keeps its
    /// previous value (initially the raw title).
    pub fn apply(&self, track: &mut TrackRecord) {
        if self.regex.captures_len() <= 1 {
            debug!("Title pattern has no capture group, keeping '{}'", track.title);
            return;
        }

        match self.regex.captures(&track.raw_title) {
            Some(caps) => {
                if let Some(group) = caps.get(1) {
                    let cleaned = group.as_str().trim();
                    if cleaned.is_empty() {
                        debug!("Title pattern captured nothing for '{}'", track.raw_title);
                    } else {
                        track.title = cleaned.to_string();
                    }
                }
            }
            None => {
                debug!("Title pattern did not match '{}'", track.raw_title);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawEntry;

    fn track(raw_title: &str) -> TrackRecord {
        let entry = RawEntry {
            title: raw_title.to_string(),
            duration_secs: 0,
            webpage_url: "u".to_string(),
            index: None,
        };
        TrackRecord::from_entry(&entry, 1, 1)
    }

    #[test]
    fn test_capture_group_becomes_title() {
        let pattern = TitlePattern::new(r"(.*)\s*-").unwrap();
        let mut t = track("Song A - X");
        pattern.apply(&mut t);
        assert_eq!(t.title, "Song A");
    }

    #[test]
    fn test_no_match_keeps_raw_title() {
        let pattern = TitlePattern::new(r"(.*)\s*-").unwrap();
        let mut t = track("Song C");
        pattern.apply(&mut t);
        assert_eq!(t.title, "Song C");
    }

    #[test]
    fn test_zero_capture_groups_keeps_title() {
        let pattern = TitlePattern::new(r".*-").unwrap();
        let mut t = track("Song A - X");
        pattern.apply(&mut t);
        assert_eq!(t.title, "Song A - X");
    }

    #[test]
    fn test_empty_capture_keeps_title() {
        let pattern = TitlePattern::new(r"(\s*)Song").unwrap();
        let mut t = track("Song A");
        pattern.apply(&mut t);
        assert_eq!(t.title, "Song A");
    }

    #[test]
    fn test_match_is_anchored_at_start() {
        // Would match mid-string without anchoring.
        let pattern = TitlePattern::new(r"(B.*)").unwrap();
        let mut t = track("A B C");
        pattern.apply(&mut t);
        assert_eq!(t.title, "A B C");
    }

    #[test]
    fn test_idempotent_across_preview_passes() {
        let pattern = TitlePattern::new(r"(.*)\s*-").unwrap();
        let mut t = track("Song A - X");
        pattern.apply(&mut t);
        let once = t.title.clone();
        pattern.apply(&mut t);
        assert_eq!(t.title, once);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = TitlePattern::new(r"((");
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_example_playlist_scenario() {
        let pattern = TitlePattern::new(r"(.*)\s*-").unwrap();
        let raw = ["Song A - X", "Song B - Y", "Song C"];
        let expected = ["Song A", "Song B", "Song C"];
        for (raw_title, want) in raw.iter().zip(expected) {
            let mut t = track(raw_title);
            pattern.apply(&mut t);
            assert_eq!(t.title, want);
        }
    }
}

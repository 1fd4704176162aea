//! Downloadinator Core Library
//!
//! This crate provides the processing pipeline behind Downloadinator:
//! - Playlist metadata extraction (ordered raw entries from a URL)
//! - Track records with album-wide metadata editing and title cleanup
//! - A queue controller driving sequential or parallel downloads
//! - Tag writing for the downloaded audio (mp3/m4a)
//! - JSON save/load of the editing session
//! - Application configuration management
//!
//! The presentation layer is deliberately absent: the controller emits
//! status events through a channel and does not know how they are shown.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod queue;
pub mod session;
pub mod tags;
pub mod track;

pub use config::{AppConfig, default_output_root};
pub use error::{Error, Result};
pub use extract::{MetadataExtractor, RawEntry, RustyYtdlExtractor, extract_playlist_id};
pub use fetch::{AudioFetcher, FetchEvent, FetchObserver, RustyYtdlFetcher, sanitize_filename};
pub use normalize::TitlePattern;
pub use queue::{
    DispatchPolicy, QueueController, RunSummary, SessionState, TrackEvent,
};
pub use session::{SessionDocument, SessionTrack};
pub use tags::{ContainerTagWriter, OutputContainer, TagWriter};
pub use track::{AlbumFields, TrackIndex, TrackRecord, TrackStatus};

//! Queue controller: owns the ordered track list for one session and
//! drives downloads under a sequential or parallel dispatch policy.
//!
//! Workers are short-lived: one blocking task per dispatched fetch, never
//! pooled or shared. Workers communicate exclusively through a one-way
//! event channel; every `TrackRecord` mutation happens here, on the
//! controller's task. Under the sequential policy (the default) track
//! *N+1* is dispatched only after track *N*'s terminal event has been
//! observed - success or error, the cursor advances either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extract::RawEntry;
use crate::fetch::{AudioFetcher, FetchEvent, FetchObserver, sanitize_filename};
use crate::normalize::TitlePattern;
use crate::session::SessionDocument;
use crate::tags::TagWriter;
use crate::track::{AlbumFields, TrackRecord, TrackStatus};

/// Download dispatch policy for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// One track at a time, advancing only on the previous track's
    /// terminal event.
    #[default]
    Sequential,
    /// Every track's fetch dispatched concurrently.
    Parallel,
}

/// Session-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No download run in progress.
    #[default]
    Idle,
    /// A download run is in progress.
    Running,
}

/// Status events emitted toward the presentation layer.
///
/// The controller only emits these; it does not know how they are
/// displayed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum TrackEvent {
    /// A download run started.
    RunStarted {
        /// Number of tracks in the run.
        total: usize,
    },
    /// A track's fetch was dispatched.
    TrackStarted {
        /// Track position in the session list (zero-based).
        index: usize,
    },
    /// A track reported transfer progress.
    TrackProgress {
        /// Track position in the session list (zero-based).
        index: usize,
        /// Bytes downloaded so far.
        bytes: u64,
        /// Total bytes (0 when unknown).
        total: u64,
    },
    /// A track's audio is retrieved and tags are being written.
    TrackProcessing {
        /// Track position in the session list (zero-based).
        index: usize,
    },
    /// A track finished successfully.
    TrackFinished {
        /// Track position in the session list (zero-based).
        index: usize,
    },
    /// A track ended in error.
    TrackFailed {
        /// Track position in the session list (zero-based).
        index: usize,
        /// Failure reason.
        reason: String,
    },
    /// The run ended and the session is idle again.
    RunFinished {
        /// Number of tracks that reached a terminal state.
        completed: usize,
    },
}

/// Outcome of one download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Tracks in the session.
    pub total: usize,
    /// Tracks that reached a terminal state (success or error).
    pub completed: usize,
    /// Tracks that ended in `Error`.
    pub failed: usize,
}

/// Owns the ordered track list and drives the download pipeline.
pub struct QueueController {
    playlist_url: String,
    tracks: Vec<TrackRecord>,
    fields: AlbumFields,
    policy: DispatchPolicy,
    output_root: PathBuf,
    state: SessionState,
    tracks_completed: usize,
    event_tx: mpsc::UnboundedSender<TrackEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<TrackEvent>>,
}

impl QueueController {
    /// Create a controller with an empty track list.
    #[must_use]
    pub fn new(policy: DispatchPolicy, output_root: impl Into<PathBuf>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            playlist_url: String::new(),
            tracks: Vec::new(),
            fields: AlbumFields::default(),
            policy,
            output_root: output_root.into(),
            state: SessionState::Idle,
            tracks_completed: 0,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the status event receiver for the presentation layer.
    ///
    /// Returns `None` after the first call.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TrackEvent>> {
        self.event_rx.take()
    }

    /// Replace the track list with records built from extraction entries.
    ///
    /// Index pairs are one-based against the entry count; an entry without
    /// a playlist position gets its list position.
    pub fn load_entries(&mut self, playlist_url: impl Into<String>, entries: Vec<RawEntry>) {
        self.playlist_url = playlist_url.into();
        let total = entries.len() as u32;
        self.tracks = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let position = entry.index.unwrap_or(i as u32 + 1);
                TrackRecord::from_entry(entry, position, total)
            })
            .collect();
        self.tracks_completed = 0;
        info!("Loaded {} tracks from {}", self.tracks.len(), self.playlist_url);
    }

    /// Replace the session contents from a saved session document.
    pub fn load_session(&mut self, document: SessionDocument) {
        self.playlist_url = document.playlist_url.clone();
        self.fields = document.album_fields();
        self.tracks = document.into_tracks();
        self.tracks_completed = 0;
        info!("Restored session with {} tracks", self.tracks.len());
    }

    /// Snapshot the session as a serializable document.
    #[must_use]
    pub fn to_session(&self) -> SessionDocument {
        SessionDocument::from_tracks(self.playlist_url.clone(), &self.fields, &self.tracks)
    }

    /// Apply the album-wide fields and the title pattern to every track.
    ///
    /// Resets each track's status and progress; derived titles are
    /// recomputed from the raw title on every pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    /// No track is touched in that case.
    pub fn preview(&mut self, fields: AlbumFields) -> Result<()> {
        let pattern = TitlePattern::new(&fields.title_pattern)?;
        self.fields = fields;
        for track in &mut self.tracks {
            track.status = TrackStatus::Idle;
            track.progress = (0, 0);
            track.apply_album_fields(&self.fields);
            pattern.apply(track);
        }
        debug!("Preview applied to {} tracks", self.tracks.len());
        Ok(())
    }

    /// Current track list.
    #[must_use]
    pub fn tracks(&self) -> &[TrackRecord] {
        &self.tracks
    }

    /// Current album-wide fields.
    #[must_use]
    pub const fn fields(&self) -> &AlbumFields {
        &self.fields
    }

    /// Playlist URL of the current session.
    #[must_use]
    pub fn playlist_url(&self) -> &str {
        &self.playlist_url
    }

    /// Session-level state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Number of tracks that reached a terminal state in the last run.
    #[must_use]
    pub const fn tracks_completed(&self) -> usize {
        self.tracks_completed
    }

    /// Run the download pipeline over every track.
    ///
    /// Ensures the album's destination directory exists (idempotent; an
    /// existing directory is a no-op, any other creation failure aborts
    /// before any dispatch). Runs to completion: there is no cancellation.
    /// Every track reaches a terminal state and counts toward the
    /// completion total regardless of success or error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryCreation`] if the destination directory
    /// cannot be created.
    #[allow(clippy::too_many_lines)]
    pub async fn run(
        &mut self,
        fetcher: Arc<dyn AudioFetcher>,
        tagger: Arc<dyn TagWriter>,
    ) -> Result<RunSummary> {
        let total = self.tracks.len();
        if total == 0 {
            debug!("No tracks loaded, nothing to download");
            return Ok(RunSummary {
                total: 0,
                completed: 0,
                failed: 0,
            });
        }

        let dest_dir = self.output_root.join(album_dir_name(&self.fields.album));
        std::fs::create_dir_all(&dest_dir).map_err(|e| Error::DirectoryCreation {
            path: dest_dir.clone(),
            reason: e.to_string(),
        })?;

        self.state = SessionState::Running;
        self.tracks_completed = 0;
        let mut failed = 0usize;
        self.emit(TrackEvent::RunStarted { total });
        info!(
            "Starting {:?} download run of {} tracks into {}",
            self.policy,
            total,
            dest_dir.display()
        );

        let (worker_tx, mut worker_rx) = mpsc::unbounded_channel::<(usize, FetchEvent)>();

        let mut cursor = match self.policy {
            DispatchPolicy::Sequential => {
                self.dispatch(0, &dest_dir, &fetcher, &worker_tx);
                1
            }
            DispatchPolicy::Parallel => {
                for index in 0..total {
                    self.dispatch(index, &dest_dir, &fetcher, &worker_tx);
                }
                total
            }
        };

        while self.tracks_completed < total {
            let Some((index, event)) = worker_rx.recv().await else {
                warn!("Worker channel closed before all tracks finished");
                break;
            };

            match event {
                FetchEvent::Downloading { bytes, total: stream_total } => {
                    let track = &mut self.tracks[index];
                    track.status = TrackStatus::Downloading;
                    track.progress = (bytes, stream_total.unwrap_or(0));
                    self.emit(TrackEvent::TrackProgress {
                        index,
                        bytes,
                        total: stream_total.unwrap_or(0),
                    });
                }
                FetchEvent::Finished { path } => {
                    {
                        let track = &mut self.tracks[index];
                        track.status = TrackStatus::Processing;
                        track.progress = (0, 0);
                    }
                    self.emit(TrackEvent::TrackProcessing { index });

                    match self.write_tags(index, path, &tagger).await {
                        Ok(()) => {
                            self.tracks[index].status = TrackStatus::Done;
                            self.emit(TrackEvent::TrackFinished { index });
                        }
                        Err(e) => {
                            warn!("Tagging failed for track {}: {}", index, e);
                            let track = &mut self.tracks[index];
                            track.status = TrackStatus::Error;
                            track.progress = (0, 1);
                            failed += 1;
                            self.emit(TrackEvent::TrackFailed {
                                index,
                                reason: e.to_string(),
                            });
                        }
                    }

                    self.tracks_completed += 1;
                    cursor = self.advance(cursor, &dest_dir, &fetcher, &worker_tx);
                }
                FetchEvent::Error { reason } => {
                    warn!("Fetch failed for track {}: {}", index, reason);
                    let track = &mut self.tracks[index];
                    track.status = TrackStatus::Error;
                    // Deliberate "full red bar" sentinel, not a ratio
                    track.progress = (0, 1);
                    failed += 1;
                    self.emit(TrackEvent::TrackFailed { index, reason });

                    self.tracks_completed += 1;
                    cursor = self.advance(cursor, &dest_dir, &fetcher, &worker_tx);
                }
            }
        }

        self.state = SessionState::Idle;
        self.emit(TrackEvent::RunFinished {
            completed: self.tracks_completed,
        });
        info!(
            "Download run finished: {}/{} tracks terminal, {} failed",
            self.tracks_completed, total, failed
        );

        Ok(RunSummary {
            total,
            completed: self.tracks_completed,
            failed,
        })
    }

    /// Dispatch one track's fetch on a fresh blocking worker.
    fn dispatch(
        &mut self,
        index: usize,
        dest_dir: &Path,
        fetcher: &Arc<dyn AudioFetcher>,
        worker_tx: &mpsc::UnboundedSender<(usize, FetchEvent)>,
    ) {
        let track = &mut self.tracks[index];
        track.status = TrackStatus::Downloading;
        track.progress = (0, 0);
        let source_url = track.source_url.clone();
        let base_name = track.title.clone();
        debug!("Dispatching track {} ('{}')", index, base_name);
        self.emit(TrackEvent::TrackStarted { index });

        let fetcher = Arc::clone(fetcher);
        let dest_dir = dest_dir.to_path_buf();
        let terminal_tx = worker_tx.clone();
        let progress_tx = worker_tx.clone();

        tokio::task::spawn_blocking(move || {
            let observer: FetchObserver = Box::new(move |event| {
                let _ = progress_tx.send((index, event));
            });
            // Exactly one terminal event per track, whichever way it ends
            let terminal = match fetcher.fetch(&source_url, &dest_dir, &base_name, &observer) {
                Ok(path) => FetchEvent::Finished { path },
                Err(e) => FetchEvent::Error {
                    reason: e.to_string(),
                },
            };
            let _ = terminal_tx.send((index, terminal));
        });
    }

    /// Under the sequential policy, dispatch the next pending track.
    fn advance(
        &mut self,
        cursor: usize,
        dest_dir: &Path,
        fetcher: &Arc<dyn AudioFetcher>,
        worker_tx: &mpsc::UnboundedSender<(usize, FetchEvent)>,
    ) -> usize {
        if self.policy == DispatchPolicy::Sequential && cursor < self.tracks.len() {
            self.dispatch(cursor, dest_dir, fetcher, worker_tx);
            cursor + 1
        } else {
            cursor
        }
    }

    /// Write tags for a fetched track on a blocking worker.
    async fn write_tags(
        &self,
        index: usize,
        path: PathBuf,
        tagger: &Arc<dyn TagWriter>,
    ) -> Result<()> {
        let tagger = Arc::clone(tagger);
        let record = self.tracks[index].clone();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || tagger.write(&task_path, &record))
            .await
            .map_err(|e| Error::TagWrite {
                path,
                reason: format!("tagging task failed: {e}"),
            })?
    }

    fn emit(&self, event: TrackEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for QueueController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueController")
            .field("tracks", &self.tracks.len())
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Directory name for an album, derived from its title.
fn album_dir_name(album: &str) -> String {
    let name = sanitize_filename(album);
    if name.is_empty() {
        "Untitled Album".to_string()
    } else {
        name
    }
}

//! Downloadinator - fetch a playlist's metadata, edit album-wide fields,
//! and download each track as a tagged audio file.
//!
//! This is the command-line front end; all pipeline logic lives in
//! `downloadinator-core`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use downloadinator_core::{
    AlbumFields, AppConfig, ContainerTagWriter, MetadataExtractor, QueueController, Result,
    RustyYtdlExtractor, RustyYtdlFetcher, SessionDocument, TrackEvent,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "downloadinator", version, about = "Playlist downloader with album tagging")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a playlist's metadata and start a new session file.
    Fetch {
        /// Playlist (or single video) URL.
        url: String,
        /// Session file to create.
        #[arg(long, default_value = "session.json")]
        session: PathBuf,
    },
    /// Apply album-wide fields and the title pattern, then show the result.
    Preview {
        /// Session file to edit.
        #[arg(long, default_value = "session.json")]
        session: PathBuf,
        /// Title pattern with one capture group.
        #[arg(long)]
        pattern: Option<String>,
        /// Album-wide artist.
        #[arg(long)]
        artist: Option<String>,
        /// Album name.
        #[arg(long)]
        album: Option<String>,
        /// Release year.
        #[arg(long)]
        year: Option<String>,
        /// Genre.
        #[arg(long)]
        genre: Option<String>,
        /// Cover-art image path.
        #[arg(long)]
        art: Option<PathBuf>,
    },
    /// Download every track in the session as tagged audio.
    Download {
        /// Session file to run.
        #[arg(long, default_value = "session.json")]
        session: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Command::Fetch { url, session } => fetch(&config, &url, &session),
        Command::Preview {
            session,
            pattern,
            artist,
            album,
            year,
            genre,
            art,
        } => preview(&config, &session, pattern, artist, album, year, genre, art),
        Command::Download { session } => download(config, &session).await,
    }
}

fn fetch(config: &AppConfig, url: &str, session_path: &std::path::Path) -> Result<()> {
    let extractor = RustyYtdlExtractor::new();
    let entries = extractor.fetch_entries(url)?;
    if entries.is_empty() {
        warn!("No entries found for {}", url);
    }

    let mut controller = new_controller(config);
    controller.load_entries(url, entries);
    controller.to_session().save(session_path)?;

    println!("Fetched {} tracks:", controller.tracks().len());
    print_tracks(&controller);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn preview(
    config: &AppConfig,
    session_path: &std::path::Path,
    pattern: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    year: Option<String>,
    genre: Option<String>,
    art: Option<PathBuf>,
) -> Result<()> {
    let document = SessionDocument::load(session_path)?;
    let saved = document.album_fields();
    let fields = AlbumFields {
        artist: artist.unwrap_or(saved.artist),
        album: album.unwrap_or(saved.album),
        year: year.unwrap_or(saved.year),
        genre: genre.unwrap_or(saved.genre),
        album_art_path: art.or(saved.album_art_path),
        title_pattern: pattern.unwrap_or(saved.title_pattern),
    };

    let mut controller = new_controller(config);
    let playlist_url = document.playlist_url.clone();
    controller.load_session(document);
    controller.preview(fields)?;
    controller.to_session().save(session_path)?;

    println!("Preview for {playlist_url}:");
    print_tracks(&controller);
    Ok(())
}

async fn download(config: AppConfig, session_path: &std::path::Path) -> Result<()> {
    let document = SessionDocument::load(session_path)?;
    let fields = document.album_fields();

    let mut controller = new_controller(&config);
    controller.load_session(document);
    controller.preview(fields)?;

    #[allow(clippy::expect_used)]
    let mut events = controller
        .take_event_receiver()
        .expect("event receiver is taken exactly once");
    let titles: Vec<String> = controller.tracks().iter().map(|t| t.title.clone()).collect();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&titles, &event);
        }
    });

    let fetcher = Arc::new(RustyYtdlFetcher::new(config.output_container));
    let tagger = Arc::new(ContainerTagWriter::new(config.output_container));
    let summary = controller.run(fetcher, tagger).await?;
    drop(controller);
    let _ = printer.await;

    info!(
        "Run finished: {}/{} tracks, {} failed",
        summary.completed, summary.total, summary.failed
    );
    println!(
        "Done: {} of {} tracks downloaded ({} failed)",
        summary.completed - summary.failed,
        summary.total,
        summary.failed
    );
    Ok(())
}

fn new_controller(config: &AppConfig) -> QueueController {
    QueueController::new(config.dispatch_policy(), config.output_root.clone())
}

fn print_tracks(controller: &QueueController) {
    for track in controller.tracks() {
        println!(
            "  {:>5}  {:<40}  {:>7}  {}",
            track.index.to_string(),
            track.title,
            track.readable_duration(),
            track.status
        );
    }
}

fn print_event(titles: &[String], event: &TrackEvent) {
    let title = |index: &usize| titles.get(*index).map_or("?", String::as_str);
    match event {
        TrackEvent::RunStarted { total } => println!("Downloading {total} tracks..."),
        TrackEvent::TrackStarted { index } => println!("  {} downloading", title(index)),
        TrackEvent::TrackProgress { index, bytes, total } => {
            if *total > 0 {
                println!("  {} {bytes}/{total} bytes", title(index));
            }
        }
        TrackEvent::TrackProcessing { index } => println!("  {} tagging", title(index)),
        TrackEvent::TrackFinished { index } => println!("  {} done", title(index)),
        TrackEvent::TrackFailed { index, reason } => {
            println!("  {} FAILED: {reason}", title(index));
        }
        TrackEvent::RunFinished { completed } => println!("{completed} tracks finished"),
    }
}

//! Batch ingestion of a reference directory into the catalog.

use std::path::{Path, PathBuf};

use futures::{stream, StreamExt};
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use crate::config::ScoringConfig;
use crate::errors::Result;
use crate::fingerprint::extraction::Extractor;
use crate::fingerprint::hashing::generate_tokens;
use crate::persistance::{Catalog, NewTrack, TrackId};

pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "m4a"];
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// How many extractor processes may run at once.
const EXTRACT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub found: usize,
    pub processed: usize,
    pub errors: usize,
    pub total_tracks: u64,
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Audio files directly inside `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_audio(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Fingerprint one file and store it as a new track.
///
/// Nothing is written unless extraction succeeded, and the track is stored
/// together with its tokens, so a failed file never leaves a partial entry.
pub async fn ingest_file<C: Catalog + ?Sized>(
    catalog: &C,
    extractor: &dyn Extractor,
    path: &Path,
    config: &ScoringConfig,
) -> Result<TrackId> {
    let extracted = extractor.extract(path).await?;
    store(catalog, path, extracted.fingerprint, extracted.duration, config).await
}

async fn store<C: Catalog + ?Sized>(
    catalog: &C,
    path: &Path,
    fingerprint: Vec<u32>,
    duration: f64,
    config: &ScoringConfig,
) -> Result<TrackId> {
    let config = *config;
    let tokens = spawn_blocking(move || generate_tokens(&fingerprint, &config)).await?;
    let title = path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let track = NewTrack { title, artist: UNKNOWN_ARTIST.to_string(), duration };
    catalog.add_track_with_tokens(&track, &tokens).await
}

pub async fn ingest_directory<C: Catalog + ?Sized>(
    catalog: &C,
    extractor: &dyn Extractor,
    dir: &Path,
    config: &ScoringConfig,
) -> Result<IngestReport> {
    let files = discover(dir)?;
    info!(dir = %dir.display(), found = files.len(), "found audio files to process");

    let mut processed = 0;
    let mut errors = 0;

    // extraction runs ahead concurrently; inserts stay one at a time
    let mut extractions = stream::iter(files.iter())
        .map(|path| async move { (path, extractor.extract(path).await) })
        .buffered(EXTRACT_CONCURRENCY);

    while let Some((path, extracted)) = extractions.next().await {
        let outcome = match extracted {
            Ok(extracted) => {
                store(catalog, path, extracted.fingerprint, extracted.duration, config).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(track_id) => {
                info!(file = %path.display(), track_id, "ingested");
                processed += 1;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to ingest");
                errors += 1;
            }
        }
    }

    let total_tracks = catalog.stats().await?.songs;
    info!(processed, errors, total_tracks, "ingestion complete");

    Ok(IngestReport { found: files.len(), processed, errors, total_tracks })
}

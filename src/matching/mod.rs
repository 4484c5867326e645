//! Query-side pipeline: tokens → index lookup → grouping → scoring → selection.

pub mod aggregate;
pub mod scoring;
pub mod selection;

use std::sync::Arc;

use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::errors::{ResonateError, Result};
use crate::fingerprint::hashing::{generate_tokens, HashToken};
use crate::matching::aggregate::group_by_track;
use crate::matching::selection::select_best;
use crate::persistance::{Catalog, Track};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub track: Track,
    pub confidence: f64,
    pub match_count: usize,
}

/// Runs identifications against one catalog.
pub struct Identifier<C: ?Sized> {
    catalog: Arc<C>,
    config: ScoringConfig,
}

impl<C: Catalog + ?Sized> Identifier<C> {
    pub fn new(catalog: Arc<C>, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Identify a clip from its raw fingerprint.
    ///
    /// `Ok(None)` means no candidate cleared the threshold, including the case
    /// of a clip too short to produce a single token. Hashing and scoring run
    /// on the blocking pool.
    pub async fn identify(&self, fingerprint: &[u32]) -> Result<Option<MatchResult>> {
        let config = self.config;

        let owned = fingerprint.to_vec();
        let tokens = spawn_blocking(move || generate_tokens(&owned, &config)).await?;
        if tokens.is_empty() {
            debug!(len = fingerprint.len(), "fingerprint too short to tokenize");
            return Ok(None);
        }

        let hashes: Vec<HashToken> = tokens.iter().map(|t| t.hash).collect();
        let hits = self.catalog.lookup(&hashes).await?;

        let query_token_count = tokens.len();
        let (best, candidate_count) = spawn_blocking(move || {
            let candidates = group_by_track(hits);
            (select_best(&candidates, query_token_count, &config), candidates.len())
        }).await?;

        let Some(best) = best else {
            debug!(tokens = query_token_count, candidates = candidate_count, "no match");
            return Ok(None);
        };

        let track = self.catalog.track(best.track_id).await?
            .ok_or_else(|| ResonateError::NotFound(format!("track {}", best.track_id)))?;

        debug!(
            track_id = track.id,
            confidence = best.confidence,
            match_count = best.match_count,
            candidates = candidate_count,
            "match found"
        );

        Ok(Some(MatchResult {
            track,
            confidence: best.confidence,
            match_count: best.match_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistance::database::Database;
    use crate::persistance::memory::MemoryIndex;
    use crate::persistance::NewTrack;

    fn config() -> ScoringConfig {
        ScoringConfig::new(5, 0.1, 10.0, 0.1).unwrap()
    }

    async fn ingest<C: Catalog>(catalog: &C, title: &str, fingerprint: &[u32]) -> i64 {
        let track = NewTrack { title: title.into(), artist: "Unknown".into(), duration: 1.0 };
        catalog
            .add_track_with_tokens(&track, &generate_tokens(fingerprint, &config()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn identical_clip_matches_with_full_confidence() {
        let catalog = Arc::new(MemoryIndex::new());
        let a = ingest(catalog.as_ref(), "A", &[1, 2, 3, 4, 5, 6, 7]).await;

        let identifier = Identifier::new(catalog, config());
        let result = identifier.identify(&[1, 2, 3, 4, 5, 6, 7]).await.unwrap().unwrap();

        assert_eq!(result.track.id, a);
        assert_eq!(result.track.title, "A");
        // seven values, window five: windows at 0.0, 0.1 and 0.2
        assert_eq!(result.match_count, 3);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn identical_clip_matches_through_sqlite() {
        let catalog = Arc::new(Database::connect("sqlite::memory:").await.unwrap());
        let a = ingest(catalog.as_ref(), "A", &[1, 2, 3, 4, 5, 6, 7]).await;

        let identifier = Identifier::new(catalog, config());
        let result = identifier.identify(&[1, 2, 3, 4, 5, 6, 7]).await.unwrap().unwrap();

        assert_eq!(result.track.id, a);
        assert_eq!(result.match_count, 3);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_catalog_never_matches() {
        let identifier = Identifier::new(Arc::new(MemoryIndex::new()), config());
        let fingerprint: Vec<u32> = (0..50).collect();
        assert_eq!(identifier.identify(&fingerprint).await.unwrap(), None);
    }

    #[tokio::test]
    async fn short_clip_never_matches() {
        let catalog = Arc::new(MemoryIndex::new());
        ingest(catalog.as_ref(), "A", &[1, 2, 3, 4, 5, 6, 7]).await;

        let identifier = Identifier::new(catalog, config());
        assert_eq!(identifier.identify(&[1, 2, 3, 4]).await.unwrap(), None);
        assert_eq!(identifier.identify(&[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clip_from_the_start_of_a_track_picks_that_track() {
        let catalog = Arc::new(MemoryIndex::new());
        let track_a: Vec<u32> = (0..200).map(|i| i * 31 + 7).collect();
        let track_b: Vec<u32> = (0..200).map(|i| i * 17 + 3).collect();
        ingest(catalog.as_ref(), "A", &track_a).await;
        let b = ingest(catalog.as_ref(), "B", &track_b).await;

        let identifier = Identifier::new(catalog, config());
        let result = identifier.identify(&track_b[..60]).await.unwrap().unwrap();

        assert_eq!(result.track.id, b);
        assert_eq!(result.match_count, 56);
    }

    #[tokio::test]
    async fn noisy_clip_still_matches() {
        let catalog = Arc::new(MemoryIndex::new());
        let track: Vec<u32> = (0..100).map(|i| i * 7919).collect();
        let a = ingest(catalog.as_ref(), "A", &track).await;

        // corrupt one value in every ten; each corruption spoils five windows
        let mut clip = track[..50].to_vec();
        for i in (9..clip.len()).step_by(10) {
            clip[i] ^= 0xdead_beef;
        }

        let identifier = Identifier::new(catalog, config());
        let result = identifier.identify(&clip).await.unwrap().unwrap();
        assert_eq!(result.track.id, a);
        assert!(result.match_count < 46);
    }
}

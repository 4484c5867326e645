use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::errors::{ResonateError, Result};
use crate::fingerprint::hashing::{HashToken, Token};
use crate::persistance::{
    distinct_in_order, Catalog, CatalogStats, FingerprintIndex, NewTrack, TokenOccurrence,
    Track, TrackId, TrackStore,
};

#[derive(Default)]
struct State {
    tracks: Vec<Track>,
    occurrences: HashMap<HashToken, Vec<(TrackId, f64)>>,
    occurrence_count: u64,
}

impl State {
    fn push_track(&mut self, track: &NewTrack) -> TrackId {
        let id = self.tracks.len() as TrackId + 1;
        self.tracks.push(Track {
            id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            duration: track.duration,
        });
        id
    }

    fn push_tokens(&mut self, track_id: TrackId, tokens: &[Token]) {
        for token in tokens {
            self.occurrences
                .entry(token.hash)
                .or_default()
                .push((track_id, token.offset));
        }
        self.occurrence_count += tokens.len() as u64;
    }
}

/// In-process catalog.
///
/// One `RwLock` guards everything, so an insert is invisible to lookups until
/// all of the track's occurrences are in.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl FingerprintIndex for MemoryIndex {
    async fn insert(&self, track_id: TrackId, tokens: &[Token]) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if !state.tracks.iter().any(|t| t.id == track_id) {
            return Err(ResonateError::NotFound(format!("track {track_id}")));
        }

        state.push_tokens(track_id, tokens);
        Ok(())
    }

    async fn lookup(&self, hashes: &[HashToken]) -> Result<Vec<TokenOccurrence>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let mut hits = Vec::new();
        for hash in distinct_in_order(hashes) {
            if let Some(stored) = state.occurrences.get(&hash) {
                hits.extend(stored.iter().map(|&(track_id, offset)| TokenOccurrence {
                    hash,
                    offset,
                    track_id,
                }));
            }
        }

        Ok(hits)
    }
}

#[async_trait::async_trait]
impl TrackStore for MemoryIndex {
    async fn add_track(&self, track: &NewTrack) -> Result<TrackId> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Ok(state.push_track(track))
    }

    async fn track(&self, id: TrackId) -> Result<Option<Track>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tracks.iter().find(|t| t.id == id).cloned())
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(CatalogStats {
            songs: state.tracks.len() as u64,
            fingerprints: state.occurrence_count,
        })
    }
}

#[async_trait::async_trait]
impl Catalog for MemoryIndex {
    async fn add_track_with_tokens(&self, track: &NewTrack, tokens: &[Token]) -> Result<TrackId> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = state.push_track(track);
        state.push_tokens(id, tokens);
        Ok(id)
    }
}

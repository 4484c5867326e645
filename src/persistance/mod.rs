//! Catalog storage: tracks and the token → occurrence index.
//!
//! Both backends keep the same lookup ordering: occurrences come back grouped
//! by the first position of their token in the query, and within one token in
//! insertion order. Scoring relies on that order for its alignment term.

pub mod database;
pub mod memory;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::fingerprint::hashing::{HashToken, Token};

pub type TrackId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub duration: f64,
}

/// Track metadata before the store assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenOccurrence {
    pub hash: HashToken,
    pub offset: f64,
    pub track_id: TrackId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub songs: u64,
    pub fingerprints: u64,
}

#[async_trait::async_trait]
pub trait FingerprintIndex: Send + Sync {
    /// Append one occurrence per token for `track_id`.
    ///
    /// Readers see either none or all of them. Nothing is deduplicated: the
    /// same track inserted twice counts twice when scored.
    async fn insert(&self, track_id: TrackId, tokens: &[Token]) -> Result<()>;

    /// Every stored occurrence of any of `hashes`, across all tracks.
    async fn lookup(&self, hashes: &[HashToken]) -> Result<Vec<TokenOccurrence>>;
}

#[async_trait::async_trait]
pub trait TrackStore: Send + Sync {
    async fn add_track(&self, track: &NewTrack) -> Result<TrackId>;

    async fn track(&self, id: TrackId) -> Result<Option<Track>>;

    async fn stats(&self) -> Result<CatalogStats>;
}

/// Everything the identification pipeline needs from storage.
#[async_trait::async_trait]
pub trait Catalog: FingerprintIndex + TrackStore {
    /// Register a track together with its tokens.
    ///
    /// Either both the track and all of its occurrences become visible, or
    /// neither does; a failure never leaves a track without tokens.
    async fn add_track_with_tokens(&self, track: &NewTrack, tokens: &[Token]) -> Result<TrackId>;
}

/// Drop repeated hashes, keeping the first appearance of each.
pub fn distinct_in_order(hashes: &[HashToken]) -> Vec<HashToken> {
    let mut seen = HashSet::with_capacity(hashes.len());
    hashes.iter()
        .copied()
        .filter(|hash| seen.insert(*hash))
        .collect()
}

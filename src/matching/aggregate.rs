use std::collections::HashMap;

use crate::persistance::{TokenOccurrence, TrackId};

/// Hits for one candidate track, in lookup order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub track_id: TrackId,
    pub hits: Vec<TokenOccurrence>,
}

/// Hits grouped by track, ordered by each track's first hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    candidates: Vec<CandidateMatch>,
    positions: HashMap<TrackId, usize>,
}

impl CandidateSet {
    pub fn push(&mut self, hit: TokenOccurrence) {
        match self.positions.get(&hit.track_id) {
            Some(&at) => self.candidates[at].hits.push(hit),
            None => {
                self.positions.insert(hit.track_id, self.candidates.len());
                self.candidates.push(CandidateMatch { track_id: hit.track_id, hits: vec![hit] });
            }
        }
    }

    pub fn get(&self, track_id: TrackId) -> Option<&CandidateMatch> {
        self.positions.get(&track_id).map(|&at| &self.candidates[at])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateMatch> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

pub fn group_by_track(hits: impl IntoIterator<Item = TokenOccurrence>) -> CandidateSet {
    let mut set = CandidateSet::default();
    for hit in hits {
        set.push(hit);
    }
    set
}

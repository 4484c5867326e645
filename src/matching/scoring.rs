//! Confidence scoring for a single candidate track.
//!
//! Scoring contract version 1: `min(1, 0.7 * coverage + 0.3 * alignment)`.
//! Changing either weight or the cap changes every stored comparison, so they
//! are constants rather than configuration.

use crate::config::ScoringConfig;
use crate::persistance::TokenOccurrence;

pub const SCORING_VERSION: u32 = 1;
pub const COVERAGE_WEIGHT: f64 = 0.7;
pub const ALIGNMENT_WEIGHT: f64 = 0.3;
pub const MAX_SCORE: f64 = 1.0;

/// Fraction of the query's tokens that hit this track.
///
/// `query_token_count` is counted before any deduplication.
pub fn coverage(hit_count: usize, query_token_count: usize) -> f64 {
    if query_token_count == 0 {
        return 0.0;
    }
    hit_count as f64 / query_token_count as f64
}

/// How closely hit offsets follow the query's own timeline.
///
/// Hit `i` is expected at `i * unit_time`; the mean absolute drift is scaled
/// by `normalization` and floored at zero.
pub fn alignment(hits: &[TokenOccurrence], config: &ScoringConfig) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }

    let total_delta: f64 = hits.iter()
        .enumerate()
        .map(|(i, hit)| (i as f64 * config.unit_time() - hit.offset).abs())
        .sum();
    let avg_delta = total_delta / hits.len() as f64;

    (1.0 - avg_delta / config.normalization()).max(0.0)
}

pub fn score(hits: &[TokenOccurrence], query_token_count: usize, config: &ScoringConfig) -> f64 {
    if query_token_count == 0 || hits.is_empty() {
        return 0.0;
    }

    let blended = COVERAGE_WEIGHT * coverage(hits.len(), query_token_count)
        + ALIGNMENT_WEIGHT * alignment(hits, config);

    blended.min(MAX_SCORE)
}

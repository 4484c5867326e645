use crate::config::ScoringConfig;
use crate::matching::aggregate::CandidateSet;
use crate::matching::scoring::score;
use crate::persistance::TrackId;

/// Winning candidate before its track metadata is resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestCandidate {
    pub track_id: TrackId,
    pub confidence: f64,
    pub match_count: usize,
}

/// Pick the highest scoring candidate, if it clears the threshold.
///
/// Only a strictly greater score replaces the current leader, so on a tie the
/// candidate grouped first wins.
pub fn select_best(
    candidates: &CandidateSet,
    query_token_count: usize,
    config: &ScoringConfig,
) -> Option<BestCandidate> {
    let mut best: Option<BestCandidate> = None;

    for candidate in candidates.iter() {
        let confidence = score(&candidate.hits, query_token_count, config);
        tracing::trace!(track_id = candidate.track_id, hits = candidate.hits.len(), confidence, "scored");

        if best.map_or(true, |leader| confidence > leader.confidence) {
            best = Some(BestCandidate {
                track_id: candidate.track_id,
                confidence,
                match_count: candidate.hits.len(),
            });
        }
    }

    best.filter(|winner| winner.confidence > config.threshold())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::hashing::HashToken;
    use crate::matching::aggregate::group_by_track;
    use crate::persistance::TokenOccurrence;

    fn hit(track_id: TrackId, offset: f64) -> TokenOccurrence {
        TokenOccurrence { hash: HashToken(1), offset, track_id }
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let cfg = ScoringConfig::default();
        assert_eq!(select_best(&CandidateSet::default(), 10, &cfg), None);
    }

    #[test]
    fn aligned_collision_beats_misaligned_one() {
        let cfg = ScoringConfig::default();
        let candidates = group_by_track(vec![hit(2, 9.0), hit(1, 0.0)]);

        let best = select_best(&candidates, 10, &cfg).unwrap();
        assert_eq!(best.track_id, 1);
        assert_eq!(best.match_count, 1);
        // 0.7 * 0.1 + 0.3 * 1.0
        assert!((best.confidence - 0.37).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_first_grouped_track() {
        let cfg = ScoringConfig::default();
        let candidates = group_by_track(vec![hit(7, 0.0), hit(3, 0.0)]);

        for _ in 0..5 {
            assert_eq!(select_best(&candidates, 4, &cfg).unwrap().track_id, 7);
        }

        let reversed = group_by_track(vec![hit(3, 0.0), hit(7, 0.0)]);
        assert_eq!(select_best(&reversed, 4, &cfg).unwrap().track_id, 3);
    }

    #[test]
    fn winner_must_strictly_exceed_threshold() {
        // coverage 1/2 and 100s of drift: exactly 0.7 * 0.5
        let cfg = ScoringConfig::new(5, 0.1, 10.0, 0.35).unwrap();
        let candidates = group_by_track(vec![hit(1, 100.0)]);
        assert_eq!(select_best(&candidates, 2, &cfg), None);

        let lenient = ScoringConfig::new(5, 0.1, 10.0, 0.34).unwrap();
        assert_eq!(select_best(&candidates, 2, &lenient).unwrap().track_id, 1);
    }

    #[test]
    fn weak_candidates_are_rejected() {
        let cfg = ScoringConfig::default();
        // coverage 1/100 and no alignment
        let candidates = group_by_track(vec![hit(1, 50.0)]);
        assert_eq!(select_best(&candidates, 100, &cfg), None);
    }

    #[test]
    fn zero_query_tokens_never_match() {
        let cfg = ScoringConfig::default();
        let candidates = group_by_track(vec![hit(1, 0.0)]);
        assert_eq!(select_best(&candidates, 0, &cfg), None);
    }
}

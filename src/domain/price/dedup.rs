//! Dedup of incremental poll results against the cache tail

use super::{sort_by_timestamp, PricePoint};

/// Result of filtering one poll batch against the cache
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DedupOutcome {
    /// New points in non-decreasing timestamp order, safe to append
    pub accepted: Vec<PricePoint>,
    pub duplicates: usize,
    /// Unknown points older than the cache high-water mark
    pub stale: usize,
}

/// Filter an incremental poll batch down to the points not yet cached.
///
/// The batch is sorted, then compared positionally against the trailing
/// window of `cached` whose length equals the batch size: incoming entry
/// `i` matches cache entry `len - k + i`. The provider re-sends the
/// current price regardless of the start time, so a boundary point
/// usually lands exactly on its cached counterpart.
///
/// Anything that escapes the positional check is still dropped when it
/// equals a cached point with the same timestamp or one already accepted
/// from this batch, and when it is older than the high-water mark.
pub fn select_new_points(cached: &[PricePoint], mut incoming: Vec<PricePoint>) -> DedupOutcome {
    sort_by_timestamp(&mut incoming);

    let window = incoming.len();
    let mut high_water = cached.last().map(|point| point.timestamp);
    let mut outcome = DedupOutcome::default();

    for (i, point) in incoming.into_iter().enumerate() {
        let positional = cached
            .len()
            .checked_sub(window - i)
            .map(|idx| &cached[idx]);

        if positional == Some(&point) || is_cached(cached, &point) || outcome.accepted.contains(&point) {
            outcome.duplicates += 1;
            continue;
        }

        if high_water.is_some_and(|mark| point.timestamp < mark) {
            outcome.stale += 1;
            continue;
        }

        high_water = Some(point.timestamp);
        outcome.accepted.push(point);
    }

    outcome
}

/// Scans back only through the run of entries at or after the point's timestamp
fn is_cached(cached: &[PricePoint], point: &PricePoint) -> bool {
    cached
        .iter()
        .rev()
        .take_while(|candidate| candidate.timestamp >= point.timestamp)
        .any(|candidate| candidate == point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::test_support::point;

    #[test]
    fn test_same_batch_plus_one_new_point_accepts_only_the_new_one() {
        let cached = vec![point(1, 0.1), point(2, 0.2), point(3, 0.3)];
        let mut incoming = cached.clone();
        incoming.push(point(4, 0.4));

        let outcome = select_new_points(&cached, incoming);

        assert_eq!(outcome.accepted, vec![point(4, 0.4)]);
        assert_eq!(outcome.duplicates, 3);
        assert_eq!(outcome.stale, 0);
    }

    #[test]
    fn test_boundary_point_resent_is_dropped() {
        let cached = vec![point(1, 0.1), point(2, 0.2)];
        let outcome = select_new_points(&cached, vec![point(2, 0.2), point(5, 0.25)]);
        assert_eq!(outcome.accepted, vec![point(5, 0.25)]);
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn test_batch_larger_than_cache_accepts_unmatched_prefix() {
        let cached = vec![point(1, 0.1)];
        let outcome = select_new_points(&cached, vec![point(1, 0.1), point(2, 0.2), point(3, 0.3)]);
        assert_eq!(outcome.accepted, vec![point(2, 0.2), point(3, 0.3)]);
    }

    #[test]
    fn test_empty_cache_accepts_everything_sorted() {
        let outcome = select_new_points(&[], vec![point(3, 0.3), point(1, 0.1)]);
        assert_eq!(outcome.accepted, vec![point(1, 0.1), point(3, 0.3)]);
    }

    #[test]
    fn test_unordered_batch_is_sorted_before_positional_match() {
        let cached = vec![point(1, 0.1), point(2, 0.2)];
        let outcome = select_new_points(&cached, vec![point(3, 0.3), point(2, 0.2)]);
        assert_eq!(outcome.accepted, vec![point(3, 0.3)]);
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn test_misaligned_duplicate_is_still_dropped() {
        // The provider returns the boundary point twice, shifting the window.
        let cached = vec![point(1, 0.1), point(2, 0.2)];
        let outcome = select_new_points(&cached, vec![point(2, 0.2), point(2, 0.2), point(6, 0.6)]);
        assert_eq!(outcome.accepted, vec![point(6, 0.6)]);
        assert_eq!(outcome.duplicates, 2);
    }

    #[test]
    fn test_unknown_point_older_than_high_water_mark_is_stale() {
        let cached = vec![point(1, 0.1), point(5, 0.5)];
        let outcome = select_new_points(&cached, vec![point(3, 0.3)]);
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.stale, 1);
    }

    #[test]
    fn test_price_change_at_same_timestamp_is_new() {
        let cached = vec![point(1, 0.1), point(2, 0.2)];
        let outcome = select_new_points(&cached, vec![point(2, 0.21)]);
        assert_eq!(outcome.accepted, vec![point(2, 0.21)]);
    }

    #[test]
    fn test_repeated_polls_never_accept_the_same_point_twice() {
        let mut cached = vec![point(1, 0.1)];
        let mut delivered = Vec::new();
        let batches = vec![
            vec![point(1, 0.1), point(2, 0.2)],
            vec![point(2, 0.2)],
            vec![point(2, 0.2), point(3, 0.3), point(4, 0.4)],
            vec![point(4, 0.4), point(3, 0.3)],
            vec![point(4, 0.4), point(4, 0.4), point(5, 0.5)],
        ];

        for batch in batches {
            let outcome = select_new_points(&cached, batch);
            for accepted in &outcome.accepted {
                assert!(!delivered.contains(accepted));
            }
            delivered.extend(outcome.accepted.iter().cloned());
            cached.extend(outcome.accepted);
            assert!(cached.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }

        assert_eq!(
            delivered,
            vec![point(2, 0.2), point(3, 0.3), point(4, 0.4), point(5, 0.5)]
        );
    }
}

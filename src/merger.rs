//! Sleep interval merging
//!
//! Collapses overlapping or touching sleep intervals into the minimal set of
//! disjoint sessions with a single sort-and-sweep pass.

use crate::types::SleepInterval;

/// Merge intervals into a sorted, pairwise disjoint cover of their union.
///
/// Intervals that overlap or share an endpoint are joined. Zero-length
/// intervals are valid and merge like any other.
pub fn merge_intervals(intervals: &[SleepInterval]) -> Vec<SleepInterval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|interval| interval.start());

    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for interval in iter {
        if interval.start() <= current.end() {
            let start = current.start().min(interval.start());
            let end = current.end().max(interval.end());
            // start <= end holds for both inputs, so the union is well-formed
            if let Some(joined) = SleepInterval::new(start, end) {
                current = joined;
            }
        } else {
            merged.push(current);
            current = interval;
        }
    }
    merged.push(current);

    merged
}

//! In-memory metric accumulation.
//!
//! Folds per-change events into dense per-(file, contributor, day)
//! counters. The full map is retained until [`MetricAccumulator::drain`]
//! so the store is touched exactly once per run, which is what keeps
//! million-commit ingestions tractable.

use rustc_hash::FxHashMap;
use time::Date;

use crate::model::MetricBucket;

#[derive(Default, Clone, Copy)]
struct Counters {
    commit_count: i64,
    lines_added: i64,
    lines_deleted: i64,
}

/// Accumulates change events keyed by (file, contributor, day).
///
/// Folding is commutative and associative per key, so event order does
/// not affect the result.
#[derive(Default)]
pub struct MetricAccumulator {
    buckets: FxHashMap<(i64, i64, Date), Counters>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one changed file within one commit. Repeated calls for the
    /// same key accumulate into the same bucket.
    pub fn record(&mut self, file_id: i64, contributor_id: i64, day: Date, added: i64, deleted: i64) {
        let entry = self
            .buckets
            .entry((file_id, contributor_id, day))
            .or_default();
        entry.commit_count += 1;
        entry.lines_added += added;
        entry.lines_deleted += deleted;
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drain the map into bucket rows for bulk persistence.
    ///
    /// Rows come out sorted by key so rebuilds of the same history write
    /// identical row sequences.
    pub fn drain(self) -> Vec<MetricBucket> {
        let mut rows: Vec<MetricBucket> = self
            .buckets
            .into_iter()
            .map(|((file_id, contributor_id, day), c)| MetricBucket {
                file_id,
                contributor_id,
                day,
                commit_count: c.commit_count,
                lines_added: c.lines_added,
                lines_deleted: c.lines_deleted,
            })
            .collect();
        rows.sort_by_key(|b| (b.file_id, b.contributor_id, b.day));
        rows
    }
}

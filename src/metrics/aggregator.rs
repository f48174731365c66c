//! Hash-keyed metric aggregator.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::{CounterVec, GaugeVec};

use super::cache::MetricsCache;
use super::export::{self, ExportError};
use super::row::{ContentKey, LabelSet, MetricRow};

/// Deduplicating store of [`MetricRow`]s keyed by the content hash of their labels.
///
/// All mutation happens behind one mutex, so several fetch workers of the same
/// cycle may record concurrently. Callers never see the internal map:
/// [`snapshot`](Self::snapshot) always copies out.
#[derive(Default)]
pub struct HashedAggregator {
    rows: Mutex<HashMap<ContentKey, MetricRow>>,
    cache: Option<MetricsCache>,
}

impl HashedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an aggregator that can fall back to a shared cache.
    pub fn with_cache(cache: Option<MetricsCache>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            cache,
        }
    }

    /// Drop every row.
    pub fn reset(&self) {
        self.rows.lock().clear();
    }

    /// Count one occurrence of `labels` (counter semantics).
    pub fn record(&self, labels: LabelSet) {
        let key = ContentKey::of(&labels);
        self.rows
            .lock()
            .entry(key)
            .and_modify(|row| row.value += 1.0)
            .or_insert_with(|| MetricRow::new(labels, 1.0));
    }

    /// Set the value for `labels`, replacing any previous one (gauge semantics).
    pub fn record_value(&self, labels: LabelSet, value: f64) {
        let key = ContentKey::of(&labels);
        self.rows
            .lock()
            .entry(key)
            .and_modify(|row| row.value = value)
            .or_insert_with(|| MetricRow::new(labels, value));
    }

    /// Point-in-time copy of all rows, ordered by label set.
    pub fn snapshot(&self) -> Vec<MetricRow> {
        let mut rows: Vec<MetricRow> = self.rows.lock().values().cloned().collect();
        rows.sort_by(|a, b| a.labels.cmp(&b.labels));
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Replace the contents with the cached snapshot stored under `key`.
    ///
    /// Returns `false` and leaves the aggregator empty when no cache is
    /// configured or the entry is missing or expired.
    pub fn load_from_cache(&self, key: &str) -> bool {
        let cached = self.cache.as_ref().and_then(|cache| cache.get(key));

        let mut rows = self.rows.lock();
        rows.clear();
        match cached {
            Some(snapshot) => {
                rows.extend(snapshot.iter().map(|row| (row.key(), row.clone())));
                true
            }
            None => false,
        }
    }

    /// Store the current snapshot under `key` for `ttl`. No-op without a cache.
    pub fn store_to_cache(&self, key: &str, ttl: Duration) {
        if let Some(cache) = &self.cache {
            cache.insert(key, self.snapshot(), ttl);
        }
    }

    /// Set one gauge child per row.
    pub fn gauge_set(&self, gauge: &GaugeVec) -> Result<(), ExportError> {
        export::gauge_set(&self.snapshot(), gauge)
    }

    /// Add each row's value to its counter child.
    pub fn counter_add(&self, counter: &CounterVec) -> Result<(), ExportError> {
        export::counter_add(&self.snapshot(), counter)
    }
}

impl std::fmt::Debug for HashedAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashedAggregator")
            .field("rows", &self.len())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::labels;
    use prometheus::Opts;
    use std::sync::Arc;

    fn project(name: &str) -> LabelSet {
        labels([("project", name)])
    }

    #[test]
    fn test_record_merges_identical_labels() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        agg.record(project("P"));

        let rows = agg.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2.0);
    }

    #[test]
    fn test_record_merges_regardless_of_insertion_order() {
        let agg = HashedAggregator::new();
        agg.record(labels([("a", "1"), ("b", "2")]));
        agg.record(labels([("b", "2"), ("a", "1")]));

        assert_eq!(agg.len(), 1);
        assert_eq!(agg.snapshot()[0].value, 2.0);
    }

    #[test]
    fn test_record_value_overwrites() {
        let agg = HashedAggregator::new();
        agg.record_value(project("P"), 3.0);
        agg.record_value(project("P"), 7.5);

        let rows = agg.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 7.5);
    }

    #[test]
    fn test_distinct_labels_stay_separate() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        agg.record(project("Q"));
        agg.record_value(labels([("project", "P"), ("state", "x")]), 4.0);

        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn test_reset_clears_rows() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        agg.reset();
        assert!(agg.is_empty());
        assert!(agg.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        let before = agg.snapshot();

        agg.record(project("P"));
        agg.record(project("Q"));
        agg.reset();

        assert_eq!(before, vec![MetricRow::new(project("P"), 1.0)]);
    }

    #[test]
    fn test_snapshot_is_sorted_by_labels() {
        let agg = HashedAggregator::new();
        for name in ["c", "a", "b"] {
            agg.record(project(name));
        }
        let names: Vec<_> = agg
            .snapshot()
            .into_iter()
            .map(|row| row.labels["project"].clone())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_record() {
        let agg = Arc::new(HashedAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = Arc::clone(&agg);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        agg.record(project("P"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let rows = agg.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2000.0);
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = MetricsCache::default();
        let agg = HashedAggregator::with_cache(Some(cache.clone()));
        agg.record_value(project("P"), 1.0);
        agg.record(project("Q"));
        let stored = agg.snapshot();
        agg.store_to_cache("general/info", Duration::from_secs(60));

        let restored = HashedAggregator::with_cache(Some(cache));
        restored.record(project("stale"));
        assert!(restored.load_from_cache("general/info"));
        assert_eq!(restored.snapshot(), stored);
    }

    #[test]
    fn test_load_from_cache_after_ttl_leaves_empty() {
        let cache = MetricsCache::default();
        let agg = HashedAggregator::with_cache(Some(cache));
        agg.record(project("P"));
        agg.store_to_cache("general/info", Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(50));

        assert!(!agg.load_from_cache("general/info"));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_cache_operations_without_cache_are_noops() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        agg.store_to_cache("general/info", Duration::from_secs(60));

        assert!(!agg.load_from_cache("general/info"));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_gauge_set_exports_each_row() {
        let agg = HashedAggregator::new();
        agg.record_value(project("P"), 2.0);
        agg.record_value(project("Q"), 5.0);

        let gauge = GaugeVec::new(Opts::new("test_gauge", "test"), &["project"]).unwrap();
        agg.gauge_set(&gauge).unwrap();

        assert_eq!(gauge.with_label_values(&["P"]).get(), 2.0);
        assert_eq!(gauge.with_label_values(&["Q"]).get(), 5.0);
    }

    #[test]
    fn test_counter_add_accumulates() {
        let agg = HashedAggregator::new();
        agg.record(project("P"));
        agg.record(project("P"));

        let counter = CounterVec::new(Opts::new("test_counter", "test"), &["project"]).unwrap();
        agg.counter_add(&counter).unwrap();
        agg.counter_add(&counter).unwrap();

        assert_eq!(counter.with_label_values(&["P"]).get(), 4.0);
    }
}

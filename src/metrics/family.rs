//! Metric family declarations and per-cycle family sets.

use std::time::Duration;

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use super::aggregator::HashedAggregator;
use super::cache::MetricsCache;
use super::row::{LabelSet, MetricRow};

/// Prometheus metric type of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static description of one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub kind: MetricKind,
}

impl MetricDesc {
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            kind: MetricKind::Gauge,
        }
    }

    pub const fn counter(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            kind: MetricKind::Counter,
        }
    }

    /// Project `labels` onto the declared label names.
    ///
    /// Missing labels become the empty string, undeclared ones are dropped, so
    /// every row of a family has the same dimensionality.
    pub fn normalize(&self, mut labels: LabelSet) -> LabelSet {
        self.labels
            .iter()
            .map(|name| {
                let value = labels.remove(*name).unwrap_or_default();
                ((*name).to_owned(), value)
            })
            .collect()
    }
}

/// Frozen rows of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub desc: &'static MetricDesc,
    pub rows: Vec<MetricRow>,
}

/// Frozen output of one successful collection cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub families: Vec<FamilySnapshot>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rows of the family called `name`, empty if absent.
    pub fn rows(&self, name: &str) -> &[MetricRow] {
        self.families
            .iter()
            .find(|family| family.desc.name == name)
            .map(|family| family.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.families.iter().map(|family| family.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// One [`HashedAggregator`] per declared family, built fresh for every cycle.
pub struct MetricFamilies {
    families: Vec<(&'static MetricDesc, HashedAggregator)>,
}

impl MetricFamilies {
    pub fn new(descs: &[&'static MetricDesc], cache: Option<MetricsCache>) -> Self {
        Self {
            families: descs
                .iter()
                .map(|desc| (*desc, HashedAggregator::with_cache(cache.clone())))
                .collect(),
        }
    }

    /// Cache key of `desc` within a task's namespace.
    pub fn cache_key(scope: &str, desc: &MetricDesc) -> String {
        format!("{}/{}", scope, desc.name)
    }

    fn aggregator(&self, desc: &MetricDesc) -> Option<&HashedAggregator> {
        let found = self
            .families
            .iter()
            .find(|(declared, _)| declared.name == desc.name)
            .map(|(_, agg)| agg);
        if found.is_none() {
            tracing::warn!(family = desc.name, "Dropping row for undeclared metric family");
        }
        found
    }

    /// Tally one occurrence in `desc`.
    pub fn record(&self, desc: &MetricDesc, labels: LabelSet) {
        if let Some(agg) = self.aggregator(desc) {
            agg.record(desc.normalize(labels));
        }
    }

    /// Set an absolute value in `desc`.
    pub fn record_value(&self, desc: &MetricDesc, labels: LabelSet, value: f64) {
        if let Some(agg) = self.aggregator(desc) {
            agg.record_value(desc.normalize(labels), value);
        }
    }

    pub fn reset(&self) {
        for (_, agg) in &self.families {
            agg.reset();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            families: self
                .families
                .iter()
                .map(|(desc, agg)| FamilySnapshot {
                    desc: *desc,
                    rows: agg.snapshot(),
                })
                .collect(),
        }
    }

    /// Seed every family from the cache. True only if all of them were cached.
    pub fn load_from_cache(&self, scope: &str) -> bool {
        self.families
            .iter()
            .map(|(desc, agg)| agg.load_from_cache(&Self::cache_key(scope, desc)))
            .fold(true, |all, hit| all && hit)
    }

    pub fn store_to_cache(&self, scope: &str, ttl: Duration) {
        for (desc, agg) in &self.families {
            agg.store_to_cache(&Self::cache_key(scope, desc), ttl);
        }
    }
}

impl std::fmt::Debug for MetricFamilies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.families.iter().map(|(desc, agg)| (desc.name, agg.len())))
            .finish()
    }
}

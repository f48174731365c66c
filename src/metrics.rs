//! Metric aggregation layer.
//!
//! Producers never touch Prometheus types directly. They write observations into
//! [`HashedAggregator`]s, one per metric family, which deduplicate rows by the
//! content hash of their label set. A finished cycle is frozen into a
//! [`Snapshot`] and only rendered to the text exposition format at scrape time.
//!
//! # Components
//!
//! - [`MetricRow`] / [`LabelSet`] / [`ContentKey`]: the value types
//! - [`HashedAggregator`]: thread-safe dedup/accumulate store with cache fallback
//! - [`MetricsCache`]: optional shared TTL cache of aggregator snapshots
//! - [`MetricDesc`] / [`MetricFamilies`]: per-producer family declarations
//! - [`render`]: Prometheus text exposition of published snapshots

mod aggregator;
mod cache;
mod export;
mod family;
mod row;

pub use aggregator::HashedAggregator;
pub use cache::{CacheEntry, DEFAULT_CACHE_CAPACITY, MetricsCache};
pub use export::{ExportError, counter_add, gauge_set, render};
pub use family::{FamilySnapshot, MetricDesc, MetricFamilies, MetricKind, Snapshot};
pub use row::{ContentKey, LabelSet, MetricRow, labels};

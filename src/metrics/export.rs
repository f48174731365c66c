//! Translation of snapshots into Prometheus metric vectors and text.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use super::family::{FamilySnapshot, MetricKind};
use super::row::{LabelSet, MetricRow};

/// Errors raised while rendering the exposition.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Registry rejected a family or a label set.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Encoder produced invalid UTF-8.
    #[error("exposition is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn label_map(labels: &LabelSet) -> HashMap<&str, &str> {
    labels
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Set one gauge child per row.
pub fn gauge_set(rows: &[MetricRow], gauge: &GaugeVec) -> Result<(), ExportError> {
    for row in rows {
        gauge.get_metric_with(&label_map(&row.labels))?.set(row.value);
    }
    Ok(())
}

/// Add each row's value to its counter child. Negative values are skipped.
pub fn counter_add(rows: &[MetricRow], counter: &CounterVec) -> Result<(), ExportError> {
    for row in rows {
        if row.value < 0.0 {
            tracing::warn!(value = row.value, "Skipping negative counter increment");
            continue;
        }
        counter
            .get_metric_with(&label_map(&row.labels))?
            .inc_by(row.value);
    }
    Ok(())
}

enum FamilyVec {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Render families as Prometheus text exposition.
///
/// A fresh registry is built per call, so the output reflects exactly the
/// given snapshots. Families sharing a name are written into the same vector.
pub fn render<'a, I>(families: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a FamilySnapshot>,
{
    let registry = Registry::new();
    let mut vecs: HashMap<&'static str, FamilyVec> = HashMap::new();

    for family in families {
        let desc = family.desc;
        let vec = match vecs.entry(desc.name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let opts = Opts::new(desc.name, desc.help);
                let vec = match desc.kind {
                    MetricKind::Gauge => {
                        let vec = GaugeVec::new(opts, desc.labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        FamilyVec::Gauge(vec)
                    }
                    MetricKind::Counter => {
                        let vec = CounterVec::new(opts, desc.labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        FamilyVec::Counter(vec)
                    }
                };
                entry.insert(vec)
            }
        };

        match vec {
            FamilyVec::Gauge(gauge) => gauge_set(&family.rows, gauge)?,
            FamilyVec::Counter(counter) => counter_add(&family.rows, counter)?,
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

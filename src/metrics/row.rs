//! Label sets, metric rows and their content keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Label name to label value. Ordered, so iteration is already canonical.
pub type LabelSet = BTreeMap<String, String>;

/// Build a [`LabelSet`] from any sequence of pairs.
///
/// Later duplicates of a label name replace earlier ones.
///
/// ```
/// use azure_devops_exporter::metrics::labels;
///
/// let set = labels([("project", "P"), ("state", "wellFormed")]);
/// assert_eq!(set["project"], "P");
/// ```
pub fn labels<I, K, V>(pairs: I) -> LabelSet
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// One aggregated measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub labels: LabelSet,
    pub value: f64,
}

impl MetricRow {
    pub fn new(labels: LabelSet, value: f64) -> Self {
        Self { labels, value }
    }

    /// Content key of this row's label set.
    pub fn key(&self) -> ContentKey {
        ContentKey::of(&self.labels)
    }
}

/// SHA-256 digest of a canonically serialized [`LabelSet`].
///
/// Each name and value is written length-prefixed, so `{a: "1;b=2"}` and
/// `{a: "1", b: "2"}` never serialize to the same bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Digest a label set.
    pub fn of(labels: &LabelSet) -> Self {
        let mut hasher = Sha256::new();
        for (name, value) in labels {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self)
    }
}

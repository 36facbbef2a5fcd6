use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kinds of metrics a reading can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonic series where new values are added to the stored one
    Counter,
    /// Instantaneous value that replaces the stored one
    Instant,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Instant => "instant",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation: the value of a metric at a given time.
///
/// `time` is carried verbatim from the source observation and never parsed
/// by the aggregation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Metric identity (name and label set collapsed into one string)
    pub key: String,
    /// Magnitude
    pub value: f64,
    /// Opaque timestamp from the source
    pub time: String,
    /// Merge semantics
    pub metric_type: MetricType,
}

impl Reading {
    pub fn new(
        key: impl Into<String>,
        value: f64,
        time: impl Into<String>,
        metric_type: MetricType,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            time: time.into(),
            metric_type,
        }
    }

    /// Creates a counter reading
    pub fn counter(key: impl Into<String>, value: f64, time: impl Into<String>) -> Self {
        Self::new(key, value, time, MetricType::Counter)
    }

    /// Creates an instant (gauge) reading
    pub fn instant(key: impl Into<String>, value: f64, time: impl Into<String>) -> Self {
        Self::new(key, value, time, MetricType::Instant)
    }

    /// Returns this reading updated with `incoming`.
    ///
    /// Counters accumulate, instants replace. Either way the result takes the
    /// incoming time and keeps the stored key and type.
    pub fn accept(&self, incoming: &Reading) -> Reading {
        let mut result = self.clone();
        match incoming.metric_type {
            MetricType::Counter => result.value += incoming.value,
            MetricType::Instant => result.value = incoming.value,
        }
        result.time.clone_from(&incoming.time);
        result
    }
}

/// Builder for the string identity of a metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricKey {
    name: String,
    labels: BTreeMap<String, String>,
}

impl MetricKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Adds a label, replacing any previous value for the same name
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        f.write_str(&render_labels(&[&self.labels]))
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        key.to_string()
    }
}

/// Renders one or more label sets as `{k="v",...}`.
///
/// Sets are concatenated in the order given; duplicate names are not merged.
/// Renders nothing when every set is empty.
pub fn render_labels(sets: &[&BTreeMap<String, String>]) -> String {
    if sets.iter().all(|set| set.is_empty()) {
        return String::new();
    }
    let mut buffer = String::from("{");
    let mut first = true;
    for set in sets {
        for (name, value) in set.iter() {
            if !first {
                buffer.push(',');
            }
            first = false;
            buffer.push_str(name);
            buffer.push_str("=\"");
            escape_label_value(value, &mut buffer);
            buffer.push('"');
        }
    }
    buffer.push('}');
    buffer
}

/// Renders a labelled sample line: `name{labels} value timestamp`.
pub fn render_sample(
    name: &str,
    value: &str,
    timestamp: i64,
    labels: &[&BTreeMap<String, String>],
) -> String {
    format!("{}{} {} {}", name, render_labels(labels), value, timestamp)
}

fn escape_label_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
}

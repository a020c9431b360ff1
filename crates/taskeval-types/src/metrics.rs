use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single metric: a score, a raw count, a flag or a categorical label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Flag(bool),
    Count(u64),
    Number(f64),
    Label(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Count(v) => Some(*v as f64),
            Self::Flag(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.3}"),
            Self::Count(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Label(v) => f.write_str(v),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        Self::Count(v as u64)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Label(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

/// Metric name → value, with one key designated as the headline score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsMap {
    primary: String,
    values: BTreeMap<String, MetricValue>,
}

impl MetricsMap {
    pub fn new(primary: impl Into<String>, score: f64) -> Self {
        let primary = primary.into();
        let mut values = BTreeMap::new();
        values.insert(primary.clone(), MetricValue::Number(score));
        Self { primary, values }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn primary_key(&self) -> &str {
        &self.primary
    }

    pub fn primary_score(&self) -> f64 {
        self.number(&self.primary).unwrap_or(0.0)
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(MetricValue::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

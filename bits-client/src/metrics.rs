//! Aggregate metrics dump written by the instrument.
//!
//! The dump is YAML with a top-level `data` sequence, one entry per channel.
//! `data` and each channel's `name` are required; everything else is kept
//! verbatim.

use serde::{Deserialize, Serialize, de};
use serde_yaml_ng::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub data: Vec<ChannelMetrics>,
    /// Top-level keys other than `data`.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub name: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl MetricsReport {
    /// Parse a dump. Blank input is an error: the instrument leaves the file
    /// empty when it fails before writing anything.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml_ng::Error> {
        if text.trim().is_empty() {
            return Err(de::Error::custom("metrics dump is empty"));
        }
        serde_yaml_ng::from_str(text)
    }

    pub fn channel_names(&self) -> BTreeSet<String> {
        self.data.iter().map(|c| c.name.clone()).collect()
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelMetrics> {
        self.data.iter().find(|c| c.name == name)
    }
}

impl ChannelMetrics {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Numeric field, whether the dump wrote it as an integer or a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }
}

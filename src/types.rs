//! Recording data types.

use serde::{Deserialize, Serialize};
use serde_value::Value;
use std::collections::BTreeMap;

/// Free-form provenance information attached to a [`Dataset`].
///
/// Never read by the processing stages.
pub type Metadata = BTreeMap<String, Value>;

/// Single observation of a recording.
///
/// A channel may be absent from `channels` or present with a NaN value;
/// both are treated as missing by the processing stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time of the observation in seconds.
    pub timestamp: f64,

    /// Identifier of the participant the sample belongs to.
    pub participant_id: String,

    /// Experimental condition label (empty if unlabeled).
    pub condition: String,

    /// Channel values keyed by channel name.
    pub channels: BTreeMap<String, f64>,
}

impl Sample {
    /// Create a new sample without any channel values.
    pub fn new(timestamp: f64, participant_id: &str, condition: &str) -> Self {
        Self {
            timestamp,
            participant_id: participant_id.to_string(),
            condition: condition.to_string(),
            channels: BTreeMap::new(),
        }
    }

    /// Set the value of a channel, consuming and returning the sample.
    pub fn with(mut self, channel: &str, val: f64) -> Self {
        self.channels.insert(channel.to_string(), val);
        self
    }

    /// Get the raw value of a channel, which may be NaN.
    pub fn value(&self, channel: &str) -> Option<f64> {
        self.channels.get(channel).copied()
    }

    /// Check whether a channel is absent or NaN.
    pub fn is_missing(&self, channel: &str) -> bool {
        self.value(channel).is_none_or(f64::is_nan)
    }
}

/// Ordered collection of samples.
///
/// Sample order is the ingestion order and must have non-decreasing
/// timestamps for clipping to be meaningful. Nothing here sorts samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Samples in temporal order.
    pub samples: Vec<Sample>,

    /// Known channel names.
    pub columns: Vec<String>,

    /// Provenance counters.
    pub metadata: Metadata,
}

impl Dataset {
    /// Create a new dataset with empty metadata.
    pub fn new(samples: Vec<Sample>, columns: Vec<String>) -> Self {
        Self {
            samples,
            columns,
            metadata: Metadata::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append the samples of another dataset.
    ///
    /// Columns not yet known are added in the order they are first seen.
    pub fn append(&mut self, other: Dataset) {
        for col in other.columns {
            if !self.columns.contains(&col) {
                self.columns.push(col);
            }
        }
        self.samples.extend(other.samples);
    }

    pub fn set_meta(&mut self, key: &str, val: Value) {
        self.metadata.insert(key.to_string(), val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_covers_absent_and_nan() {
        let sample = Sample::new(0.0, "p1", "")
            .with("x", 1.0)
            .with("y", f64::NAN);
        assert!(!sample.is_missing("x"));
        assert!(sample.is_missing("y"));
        assert!(sample.is_missing("z"));
        assert!(sample.value("y").is_some());
        assert!(sample.value("z").is_none());
    }

    #[test]
    fn append_keeps_first_seen_column_order() {
        let mut a = Dataset::new(
            vec![Sample::new(0.0, "p1", "A")],
            vec!["x".to_string(), "y".to_string()],
        );
        let b = Dataset::new(
            vec![Sample::new(1.0, "p2", "B")],
            vec!["y".to_string(), "z".to_string()],
        );
        a.append(b);
        assert_eq!(a.columns, vec!["x", "y", "z"]);
        assert_eq!(a.len(), 2);
        assert_eq!(a.samples[1].participant_id, "p2");
    }
}

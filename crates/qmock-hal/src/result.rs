//! Measurement outcome histograms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Histogram of measured bitstrings, ordered by bitstring.
///
/// Serializes as a plain JSON object, e.g. `{"00":512,"11":488}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` observations of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.0.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Observations of `bitstring` (zero if never seen).
    pub fn get(&self, bitstring: &str) -> u64 {
        self.0.get(bitstring).copied().unwrap_or(0)
    }

    /// Total number of observations.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most frequent outcome; ties resolve to the smallest bitstring.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.0
            .iter()
            .fold(None, |best: Option<(&str, u64)>, (k, &v)| match best {
                Some((_, best_v)) if best_v >= v => best,
                _ => Some((k.as_str(), v)),
            })
    }

    /// Iterate over `(bitstring, count)` pairs in bitstring order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Serialize to the JSON object string carried in job results.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a JSON object string as carried in job results.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (bitstring, count) in iter {
            counts.insert(bitstring, count);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_accumulates() {
        let mut counts = Counts::new();
        counts.insert("00", 1);
        counts.insert("00", 2);
        counts.insert("11", 4);
        assert_eq!(counts.get("00"), 3);
        assert_eq!(counts.get("01"), 0);
        assert_eq!(counts.total(), 7);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_json_is_ordered_object() {
        let counts: Counts = [("11".to_string(), 488), ("00".to_string(), 512)]
            .into_iter()
            .collect();
        assert_eq!(counts.to_json().unwrap(), r#"{"00":512,"11":488}"#);
        assert_eq!(Counts::from_json(r#"{"00":512,"11":488}"#).unwrap(), counts);
    }

    #[test]
    fn test_most_frequent() {
        let mut counts = Counts::new();
        assert_eq!(counts.most_frequent(), None);
        counts.insert("01", 5);
        counts.insert("10", 5);
        counts.insert("00", 1);
        assert_eq!(counts.most_frequent(), Some(("01", 5)));
    }
}

//! Persisted Record Types

use classifier::{FeatureArray, ModType};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One feature vector tagged with the modulation it was captured from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub label: ModType,
    pub timestamp_ms: i64,
    pub features: FeatureArray,
}

/// One raw window of IQ samples tagged with its modulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub label: ModType,
    pub timestamp_ms: i64,
    /// (I, Q) pairs in arrival order
    pub samples: Vec<(f64, f64)>,
}

impl WindowRecord {
    /// Build a record from complex samples
    pub fn new(label: ModType, window: &[Complex64]) -> Self {
        Self {
            label,
            timestamp_ms: now_ms(),
            samples: window.iter().map(|s| (s.re, s.im)).collect(),
        }
    }

    /// Samples as complex values
    pub fn to_complex(&self) -> Vec<Complex64> {
        self.samples.iter().map(|&(re, im)| Complex64::new(re, im)).collect()
    }
}

/// Labeled training data
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub samples: Vec<FeatureArray>,
    pub responses: Vec<ModType>,
    /// Lines that could not be parsed (e.g. NaN features written as null)
    pub skipped: usize,
}

impl Dataset {
    /// Number of labeled samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append one record
    pub fn push(&mut self, record: FeatureRecord) {
        self.samples.push(record.features);
        self.responses.push(record.label);
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

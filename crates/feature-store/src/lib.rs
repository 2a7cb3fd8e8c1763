//! Feature Store
//!
//! Session-labelled sinks for feature vectors and raw IQ windows, plus the
//! dataset loader the classifier trainer reads captures back with.

mod file;
mod memory;
mod records;

pub use file::{load_dataset, read_feature_file, read_windows, FeatureFileWriter};
pub use memory::MemorySink;
pub use records::{now_ms, Dataset, FeatureRecord, WindowRecord};

use classifier::{FeatureArray, ModType};
use num_complex::Complex64;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Sink session not started")]
    NotStarted,
    #[error("Corrupt record in {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Destination for captured features and windows.
///
/// `start` and `stop` bracket one capture session tagged with the modulation
/// being recorded; writes outside a session fail with [`StoreError::NotStarted`].
pub trait FeatureSink: Send {
    /// Open a session for the given label
    fn start(&mut self, label: ModType) -> Result<(), StoreError>;

    /// Flush and close the current session (no-op when idle)
    fn stop(&mut self) -> Result<(), StoreError>;

    /// Append one feature vector
    fn write_features(&mut self, label: ModType, features: &FeatureArray) -> Result<(), StoreError>;

    /// Append one raw sample window
    fn write_window(&mut self, label: ModType, window: &[Complex64]) -> Result<(), StoreError>;

    /// Whether a session is open
    fn is_started(&self) -> bool;
}

//! Feature Extraction Engine
//!
//! Real-time statistical and spectral feature extraction for automatic
//! modulation classification. A worker thread pulls fixed-size windows from a
//! shared IQ buffer, computes nine features on a bounded fork/join pool and
//! hands them to a classifier or a capture sink.

pub mod fft;
pub mod phase;
pub mod statistics;

mod extractor;
mod features;
mod history;
mod pipeline;

pub use extractor::{ExtractionMode, ExtractorConfig, FeatureExtractor};
pub use features::FeatureVector;
pub use fft::SpectrumAnalyzer;
pub use history::ModTypeHistory;
pub use pipeline::{FeaturePipeline, MIN_WINDOW_SIZE};

pub use classifier::{FeatureArray, ModType, FEATURE_DIMENSION};

use feature_store::StoreError;
use thiserror::Error;

/// Errors raised when configuring or starting the engine
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("CLASSIFY mode requires a classifier")]
    MissingClassifier,
    #[error("WRITE_TO_FILE mode requires a sink")]
    MissingSink,
    #[error("Feature extractor is already running")]
    AlreadyRunning,
    #[error("Window size {0} is too small")]
    InvalidWindowSize(usize),
    #[error("Buffer capacity {capacity} cannot hold a window of {window_size} samples")]
    BufferTooSmall { capacity: usize, window_size: usize },
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),
    #[error("Sink error: {0}")]
    Sink(#[from] StoreError),
}

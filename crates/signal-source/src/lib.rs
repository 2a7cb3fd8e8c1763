//! IQ Sample Sources
//!
//! A sample source keeps a shared buffer of complex baseband samples topped
//! up and publishes carrier and bandwidth estimates, each as a fraction of the
//! sample rate. The feature engine only ever reads them.

pub mod modulation;

mod replay;
mod simulated;

pub use modulation::{Waveform, WaveformParams};
pub use replay::{CaptureReplaySource, ReplayConfig};
pub use simulated::{SimulatedSource, SourceConfig};

use feature_store::StoreError;
use serde::{Deserialize, Serialize};
use shared_state::{Shared, SharedBuffer};
use thiserror::Error;

/// Sample source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source already running")]
    AlreadyRunning,
    #[error("Invalid source configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to spawn source thread: {0}")]
    Spawn(String),
    #[error("Capture error: {0}")]
    Capture(#[from] StoreError),
}

/// Where a source's samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthesized waveforms with a known label
    Simulated,
    /// Samples received over the air
    Hardware,
}

/// Producer of the sample stream the feature engine consumes
pub trait SampleSource: Send {
    fn kind(&self) -> SourceKind;

    /// Buffer holding the most recent samples
    fn buffer(&self) -> SharedBuffer;

    /// Carrier offset estimate in [0, 1)
    fn carrier_fraction(&self) -> Shared<f64>;

    /// Occupied bandwidth estimate in [0, 1)
    fn bandwidth_fraction(&self) -> Shared<f64>;

    /// Begin filling the buffer
    fn start(&mut self) -> Result<(), SourceError>;

    /// Stop filling the buffer and wait for the producer to exit
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

pub(crate) fn validate_fraction(name: &str, value: f64) -> Result<(), SourceError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(SourceError::InvalidConfig(format!("{} must be in [0, 1), got {}", name, value)))
    }
}

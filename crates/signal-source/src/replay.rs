//! Capture Replay Source
//!
//! Feeds windows recorded off a receiver (a `.windows.bin` capture) back into
//! a shared buffer at the original sample rate. Stands in for the receiver
//! when classifying received signals without the radio attached.

use crate::{validate_fraction, SampleSource, SourceError, SourceKind};
use feature_store::read_windows;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use shared_state::{shared_buffer, Shared, SharedBuffer, SharedCell};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Capture file to replay
    pub path: PathBuf,
    /// Sample rate the capture was recorded at
    pub sample_rate: f64,
    pub buffer_capacity: usize,
    pub carrier_fraction: f64,
    pub bandwidth_fraction: f64,
    /// Start over at the end of the capture
    pub looped: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("capture.windows.bin"),
            sample_rate: 1_000_000.0,
            buffer_capacity: 8192,
            carrier_fraction: 0.1,
            bandwidth_fraction: 0.1,
            looped: true,
        }
    }
}

/// Source replaying recorded receiver windows
pub struct CaptureReplaySource {
    config: ReplayConfig,
    windows: Arc<Vec<Vec<Complex64>>>,
    buffer: SharedBuffer,
    carrier: Shared<f64>,
    bandwidth: Shared<f64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureReplaySource {
    /// Load the capture file named by `config`
    pub fn open(config: ReplayConfig) -> Result<Self, SourceError> {
        let records = read_windows(&config.path)?;
        let windows = records.iter().map(|r| r.to_complex()).collect();
        Self::from_windows(config, windows)
    }

    /// Replay windows already in memory
    pub fn from_windows(config: ReplayConfig, windows: Vec<Vec<Complex64>>) -> Result<Self, SourceError> {
        validate_fraction("carrier_fraction", config.carrier_fraction)?;
        validate_fraction("bandwidth_fraction", config.bandwidth_fraction)?;
        if config.sample_rate.is_nan() || config.sample_rate <= 0.0 {
            return Err(SourceError::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                config.sample_rate
            )));
        }
        if windows.iter().all(|w| w.is_empty()) {
            return Err(SourceError::InvalidConfig(format!(
                "no samples to replay in {}",
                config.path.display()
            )));
        }

        info!("Loaded {} windows for replay", windows.len());
        Ok(Self {
            buffer: shared_buffer(config.buffer_capacity),
            carrier: SharedCell::shared(0.0),
            bandwidth: SharedCell::shared(0.0),
            windows: Arc::new(windows),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            config,
        })
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

impl SampleSource for CaptureReplaySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    fn buffer(&self) -> SharedBuffer {
        Arc::clone(&self.buffer)
    }

    fn carrier_fraction(&self) -> Shared<f64> {
        Arc::clone(&self.carrier)
    }

    fn bandwidth_fraction(&self) -> Shared<f64> {
        Arc::clone(&self.bandwidth)
    }

    fn start(&mut self) -> Result<(), SourceError> {
        if self.handle.is_some() {
            return Err(SourceError::AlreadyRunning);
        }
        self.carrier.set(self.config.carrier_fraction);
        self.bandwidth.set(self.config.bandwidth_fraction);
        self.running.store(true, Ordering::SeqCst);

        let windows = Arc::clone(&self.windows);
        let buffer = Arc::clone(&self.buffer);
        let running = Arc::clone(&self.running);
        let sample_rate = self.config.sample_rate;
        let looped = self.config.looped;

        let handle = thread::Builder::new()
            .name("amc-replay-source".to_string())
            .spawn(move || {
                loop {
                    for window in windows.iter() {
                        if !running.load(Ordering::SeqCst) {
                            return;
                        }
                        buffer.write().extend(window);
                        thread::sleep(Duration::from_secs_f64(window.len() as f64 / sample_rate));
                    }
                    if !looped {
                        warn!("Replay reached end of capture");
                        return;
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SourceError::Spawn(e.to_string())
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.running.store(false, Ordering::SeqCst);
            if handle.join().is_err() {
                error!("Replay thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CaptureReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}

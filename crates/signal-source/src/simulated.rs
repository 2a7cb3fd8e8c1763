//! Monte-Carlo Waveform Source

use crate::modulation::{add_awgn, mix, Waveform, WaveformParams};
use crate::{validate_fraction, SampleSource, SourceError, SourceKind};
use classifier::ModType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared_state::{shared_buffer, Shared, SharedBuffer, SharedCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Simulated source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Sample rate in Hz, used to pace frame generation
    pub sample_rate: f64,
    /// Samples generated per frame
    pub frame_size: usize,
    /// Capacity of the shared buffer
    pub buffer_capacity: usize,
    /// Carrier offset as a fraction of the sample rate
    pub carrier_fraction: f64,
    /// Published bandwidth estimate as a fraction of the sample rate
    pub bandwidth_fraction: f64,
    /// Signal-to-noise ratio of the added noise
    pub snr_db: f64,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Sleep between frames to match the sample rate
    pub realtime: bool,
    pub waveform: WaveformParams,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1_000_000.0,
            frame_size: 1024,
            buffer_capacity: 8192,
            carrier_fraction: 0.1,
            bandwidth_fraction: 0.1,
            snr_db: 20.0,
            seed: None,
            realtime: true,
            waveform: WaveformParams::default(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), SourceError> {
        validate_fraction("carrier_fraction", self.carrier_fraction)?;
        validate_fraction("bandwidth_fraction", self.bandwidth_fraction)?;
        if self.frame_size == 0 || self.buffer_capacity == 0 {
            return Err(SourceError::InvalidConfig(
                "frame_size and buffer_capacity must be non-zero".to_string(),
            ));
        }
        if self.sample_rate.is_nan() || self.sample_rate <= 0.0 {
            return Err(SourceError::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Wall-clock duration of one frame
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate)
    }
}

/// Source that synthesizes a labelled modulation.
///
/// The modulation can be changed while running; the buffer is cleared at the
/// next frame boundary so readers never mix old and new samples.
pub struct SimulatedSource {
    config: SourceConfig,
    buffer: SharedBuffer,
    carrier: Shared<f64>,
    bandwidth: Shared<f64>,
    mod_type: Shared<ModType>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedSource {
    pub fn new(config: SourceConfig, mod_type: ModType) -> Result<Self, SourceError> {
        config.validate()?;
        Ok(Self {
            buffer: shared_buffer(config.buffer_capacity),
            carrier: SharedCell::shared(0.0),
            bandwidth: SharedCell::shared(0.0),
            mod_type: SharedCell::shared(mod_type),
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            handle: None,
            config,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Modulation currently generated
    pub fn mod_type(&self) -> ModType {
        *self.mod_type.read()
    }

    /// Switch the generated modulation
    pub fn set_mod_type(&self, mod_type: ModType) {
        debug!("Simulated source switching to {}", mod_type);
        self.mod_type.set(mod_type);
    }

    /// Frames pushed since construction
    pub fn frames_generated(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

impl SampleSource for SimulatedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
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

        let config = self.config.clone();
        let buffer = Arc::clone(&self.buffer);
        let mod_type = Arc::clone(&self.mod_type);
        let running = Arc::clone(&self.running);
        let frames = Arc::clone(&self.frames);

        let handle = thread::Builder::new()
            .name("amc-simulated-source".to_string())
            .spawn(move || generate(config, buffer, mod_type, running, frames))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SourceError::Spawn(e.to_string())
            })?;
        self.handle = Some(handle);

        info!(
            "Simulated source started: {} at fc={}, SNR {} dB",
            self.mod_type(),
            self.config.carrier_fraction,
            self.config.snr_db
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.running.store(false, Ordering::SeqCst);
            if handle.join().is_err() {
                error!("Simulated source thread panicked");
            }
            info!("Simulated source stopped after {} frames", self.frames_generated());
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn generate(
    config: SourceConfig,
    buffer: SharedBuffer,
    mod_type: Shared<ModType>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
) {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let interval = config.frame_interval();
    let mut current = *mod_type.read();
    let mut waveform = Waveform::new(current, config.waveform, StdRng::seed_from_u64(rng.gen()));
    let mut carrier_phase = 0.0;
    let mut next_frame = Instant::now();

    while running.load(Ordering::SeqCst) {
        let requested = *mod_type.read();
        let switched = requested != current;
        if switched {
            current = requested;
            waveform = Waveform::new(current, config.waveform, StdRng::seed_from_u64(rng.gen()));
        }

        let mut frame = waveform.next_frame(config.frame_size);
        mix(&mut frame, config.carrier_fraction, &mut carrier_phase);
        add_awgn(&mut frame, config.snr_db, &mut rng);

        {
            let mut guard = buffer.write();
            if switched {
                guard.clear();
            }
            guard.extend(&frame);
        }
        frames.fetch_add(1, Ordering::SeqCst);

        if config.realtime {
            next_frame += interval;
            let now = Instant::now();
            if next_frame > now {
                thread::sleep(next_frame - now);
            } else {
                // Behind schedule: do not try to catch up
                next_frame = now;
            }
        } else {
            thread::yield_now();
        }
    }
}

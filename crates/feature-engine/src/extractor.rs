//! Feature Extraction Engine
//!
//! Owns the worker thread that repeatedly acquires a window from the shared
//! sample buffer, computes its features and dispatches them to a classifier
//! or a capture sink.

use crate::features::FeatureVector;
use crate::history::ModTypeHistory;
use crate::pipeline::FeaturePipeline;
use crate::statistics;
use crate::ConfigurationError;
use classifier::{AmcClassifier, ModType};
use feature_store::FeatureSink;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use shared_state::{Shared, SharedBuffer, SharedCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Samples per analysis window (N)
    pub window_size: usize,
    /// Classifications kept for majority-vote smoothing (M)
    pub history_size: usize,
    /// Sleep between retries while the buffer holds fewer than N samples
    pub backoff_ms: u64,
    /// Threads in the per-cycle task pool
    pub max_tasks: usize,
    /// Also send raw windows to the sink when capturing
    pub record_raw_windows: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            history_size: 10,
            backoff_ms: 10,
            max_tasks: 5,
            record_raw_windows: false,
        }
    }
}

/// What the worker does with each feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Classify and publish the smoothed label
    Classify,
    /// Append features to the sink under the given session label
    WriteToFile(ModType),
}

/// Collaborators moved into the worker and handed back when it exits
#[derive(Default)]
struct Collaborators {
    classifier: Option<Box<dyn AmcClassifier>>,
    sink: Option<Box<dyn FeatureSink>>,
}

impl Collaborators {
    /// Take back whatever `returned` still holds
    fn restore(&mut self, returned: Collaborators) {
        if returned.classifier.is_some() {
            self.classifier = returned.classifier;
        }
        if returned.sink.is_some() {
            self.sink = returned.sink;
        }
    }

    /// Close an open sink session
    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if sink.is_started() {
                if let Err(e) = sink.stop() {
                    warn!("Failed to stop sink: {}", e);
                }
            }
        }
    }
}

/// State the worker thread shares with the engine handle
struct WorkerContext {
    config: ExtractorConfig,
    mode: ExtractionMode,
    buffer: SharedBuffer,
    carrier: Shared<f64>,
    bandwidth: Shared<f64>,
    pipeline: Arc<FeaturePipeline>,
    mod_type: Shared<Option<ModType>>,
    latest: Shared<Option<FeatureVector>>,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    underflows: Arc<AtomicU64>,
}

struct Worker {
    mode: ExtractionMode,
    handle: JoinHandle<Collaborators>,
}

/// Real-time feature extraction engine.
///
/// Reads the sample buffer and the carrier/bandwidth estimators of a sample
/// source; never writes them.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    buffer: SharedBuffer,
    carrier: Shared<f64>,
    bandwidth: Shared<f64>,
    pipeline: Arc<FeaturePipeline>,
    collaborators: Collaborators,
    mod_type: Shared<Option<ModType>>,
    latest: Shared<Option<FeatureVector>>,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    underflows: Arc<AtomicU64>,
    worker: Option<Worker>,
}

impl FeatureExtractor {
    /// Create an engine reading from a source's buffer and estimators
    pub fn new(
        buffer: SharedBuffer,
        carrier: Shared<f64>,
        bandwidth: Shared<f64>,
        config: ExtractorConfig,
    ) -> Result<Self, ConfigurationError> {
        let capacity = buffer.read().capacity();
        if capacity < config.window_size {
            return Err(ConfigurationError::BufferTooSmall {
                capacity,
                window_size: config.window_size,
            });
        }
        let pipeline = FeaturePipeline::new(config.window_size, config.max_tasks)?;

        info!(
            "Feature extractor created: N={}, M={}, {} tasks",
            config.window_size, config.history_size, config.max_tasks
        );

        Ok(Self {
            config,
            buffer,
            carrier,
            bandwidth,
            pipeline: Arc::new(pipeline),
            collaborators: Collaborators::default(),
            mod_type: SharedCell::shared(None),
            latest: SharedCell::shared(None),
            running: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(AtomicU64::new(0)),
            underflows: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Attach the classifier used in [`ExtractionMode::Classify`]
    pub fn set_classifier(&mut self, classifier: Box<dyn AmcClassifier>) -> Result<(), ConfigurationError> {
        if self.is_running() {
            return Err(ConfigurationError::AlreadyRunning);
        }
        debug!("Classifier attached: {}", classifier.name());
        self.collaborators.classifier = Some(classifier);
        Ok(())
    }

    /// Attach the sink used in [`ExtractionMode::WriteToFile`]
    pub fn set_sink(&mut self, sink: Box<dyn FeatureSink>) -> Result<(), ConfigurationError> {
        if self.is_running() {
            return Err(ConfigurationError::AlreadyRunning);
        }
        self.collaborators.sink = Some(sink);
        Ok(())
    }

    /// Detach the classifier (only while stopped)
    pub fn take_classifier(&mut self) -> Option<Box<dyn AmcClassifier>> {
        self.collaborators.classifier.take()
    }

    /// Detach the sink (only while stopped)
    pub fn take_sink(&mut self) -> Option<Box<dyn FeatureSink>> {
        self.collaborators.sink.take()
    }

    /// Smoothed classification output
    pub fn shared_mod_type(&self) -> Shared<Option<ModType>> {
        Arc::clone(&self.mod_type)
    }

    /// Current smoothed label
    pub fn mod_type(&self) -> Option<ModType> {
        *self.mod_type.read()
    }

    /// Feature vector of the last completed cycle
    pub fn feature_vector(&self) -> Option<FeatureVector> {
        *self.latest.read()
    }

    /// Shared cell holding the latest feature vector
    pub fn shared_feature_vector(&self) -> Shared<Option<FeatureVector>> {
        Arc::clone(&self.latest)
    }

    /// Completed cycles since construction
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Acquisition attempts that found fewer than N samples
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Mode of the running worker
    pub fn mode(&self) -> Option<ExtractionMode> {
        self.worker.as_ref().map(|w| w.mode)
    }

    /// Validate collaborators for `mode` and launch the worker thread.
    ///
    /// Fails without starting a thread when the engine is already running or
    /// the collaborator the mode needs is missing. Capture mode opens the sink
    /// session before the worker starts.
    pub fn start(&mut self, mode: ExtractionMode) -> Result<(), ConfigurationError> {
        self.start_on(mode, thread::Builder::new().name("amc-feature-extractor".to_string()))
    }

    fn start_on(&mut self, mode: ExtractionMode, builder: thread::Builder) -> Result<(), ConfigurationError> {
        if self.is_running() {
            return Err(ConfigurationError::AlreadyRunning);
        }

        match mode {
            ExtractionMode::Classify => {
                if self.collaborators.classifier.is_none() {
                    return Err(ConfigurationError::MissingClassifier);
                }
            }
            ExtractionMode::WriteToFile(label) => {
                let sink = self
                    .collaborators
                    .sink
                    .as_mut()
                    .ok_or(ConfigurationError::MissingSink)?;
                sink.start(label)?;
            }
        }

        *self.mod_type.write() = None;
        self.running.store(true, Ordering::SeqCst);

        let ctx = WorkerContext {
            config: self.config.clone(),
            mode,
            buffer: Arc::clone(&self.buffer),
            carrier: Arc::clone(&self.carrier),
            bandwidth: Arc::clone(&self.bandwidth),
            pipeline: Arc::clone(&self.pipeline),
            mod_type: Arc::clone(&self.mod_type),
            latest: Arc::clone(&self.latest),
            running: Arc::clone(&self.running),
            cycles: Arc::clone(&self.cycles),
            underflows: Arc::clone(&self.underflows),
        };

        // Collaborators move to the worker only once it exists
        let (handoff, inbox) = mpsc::channel::<Collaborators>();
        let spawned = builder.spawn(move || {
            let collaborators = inbox.recv().unwrap_or_default();
            run_worker(ctx, collaborators)
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.collaborators.close_sink();
                return Err(ConfigurationError::Spawn(e.to_string()));
            }
        };
        if let Err(mpsc::SendError(collaborators)) = handoff.send(std::mem::take(&mut self.collaborators)) {
            error!("Feature extractor worker exited before receiving collaborators");
            self.collaborators.restore(collaborators);
        }

        info!("Feature extractor started in {:?} mode", mode);
        self.worker = Some(Worker { mode, handle });
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A cycle in flight completes first. The sink session is closed after
    /// the worker has exited. No-op when stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);

        match worker.handle.join() {
            Ok(collaborators) => {
                self.collaborators.restore(collaborators);
                self.collaborators.close_sink();
            }
            Err(_) => error!("Feature extractor worker panicked; collaborators lost"),
        }

        info!(
            "Feature extractor stopped after {} cycles ({} underflows)",
            self.cycles(),
            self.underflows()
        );
    }
}

impl Drop for FeatureExtractor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Copy the N most recent samples out of the shared buffer.
///
/// Returns false, holding no lock, when fewer than N are buffered.
fn acquire_window(buffer: &SharedBuffer, raw: &mut [Complex64]) -> bool {
    buffer.read().copy_latest(raw)
}

fn run_worker(ctx: WorkerContext, mut collaborators: Collaborators) -> Collaborators {
    let n = ctx.config.window_size;
    let backoff = Duration::from_millis(ctx.config.backoff_ms);
    let mut raw = vec![Complex64::default(); n];
    let mut history = ModTypeHistory::new(ctx.config.history_size);

    debug!("Feature worker running");

    while ctx.running.load(Ordering::SeqCst) {
        if !acquire_window(&ctx.buffer, &mut raw) {
            ctx.underflows.fetch_add(1, Ordering::Relaxed);
            thread::sleep(backoff);
            continue;
        }

        let window = statistics::normalize_center(&raw);
        let carrier = *ctx.carrier.read();
        let features = ctx.pipeline.process(&window, carrier, &ctx.bandwidth);
        *ctx.latest.write() = Some(features);
        let cycle = ctx.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        match ctx.mode {
            ExtractionMode::WriteToFile(label) => {
                if let Some(sink) = collaborators.sink.as_mut() {
                    if let Err(e) = sink.write_features(label, &features.to_array()) {
                        warn!("Cycle {}: failed to write features: {}", cycle, e);
                        continue;
                    }
                    if ctx.config.record_raw_windows {
                        if let Err(e) = sink.write_window(label, &raw) {
                            warn!("Cycle {}: failed to write window: {}", cycle, e);
                        }
                    }
                }
            }
            ExtractionMode::Classify => {
                if let Some(classifier) = collaborators.classifier.as_ref() {
                    match classifier.classify(&features.to_array()) {
                        Ok(label) => {
                            history.push(label);
                            let smoothed = history.majority();
                            *ctx.mod_type.write() = smoothed;
                            debug!("Cycle {}: classified {} (smoothed {:?})", cycle, label, smoothed);
                        }
                        Err(e) => warn!("Cycle {}: classification failed: {}", cycle, e),
                    }
                }
            }
        }
    }

    debug!("Feature worker exiting");
    collaborators
}

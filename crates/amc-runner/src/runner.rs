//! Run-Mode Controller
//!
//! Each mode needs an exact set of collaborators. `MainRun::start` checks the
//! set before any thread is spawned, then wires the source, the feature
//! engine and the classifier or sink together.

use crate::config::AmcConfig;
use crate::monte_carlo::{MonteCarloConfig, MonteCarloReport, MonteCarloTester};
use crate::trainer::{ClassifierTrainer, TrainerConfig, TrainingReport};
use crate::RunError;
use classifier::{create_classifier, load_classifier, AmcClassifier, ClassifierType, DecisionTree, ModType};
use feature_engine::{ExtractionMode, ExtractorConfig, FeatureExtractor, FeatureVector};
use feature_store::{FeatureFileWriter, FeatureSink};
use serde::{Deserialize, Serialize};
use shared_state::Shared;
use signal_source::{CaptureReplaySource, SampleSource, SimulatedSource, SourceKind};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Top-level operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Classify simulated signals
    Classify,
    /// Classify received signals
    ClassifyFromHardware,
    /// Record labelled features from the simulated source
    CaptureData,
    /// Fit a classifier to a capture directory
    TrainClassifier,
    /// Score a classifier with Monte-Carlo trials
    TestClassifier,
    #[default]
    Stopped,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Classify => "CLASSIFY",
            RunMode::ClassifyFromHardware => "CLASSIFY_FROM_HARDWARE",
            RunMode::CaptureData => "CAPTURE_DATA",
            RunMode::TrainClassifier => "TRAIN_CLASSIFIER",
            RunMode::TestClassifier => "TEST_CLASSIFIER",
            RunMode::Stopped => "STOPPED",
        }
    }

    /// Collaborators the mode needs, exactly. `None` for modes that cannot start.
    pub fn required(&self) -> Option<&'static [Collaborator]> {
        use Collaborator as C;
        match self {
            RunMode::Classify => Some(&[C::SimulatedSource, C::Classifier]),
            RunMode::ClassifyFromHardware => Some(&[C::HardwareSource, C::Classifier]),
            RunMode::CaptureData => Some(&[C::SimulatedSource, C::Sink, C::SessionLabel]),
            RunMode::TrainClassifier => Some(&[C::Classifier, C::DatasetDir, C::ModelPath]),
            RunMode::TestClassifier => Some(&[C::SimulatedSource, C::Classifier]),
            RunMode::Stopped => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collaborator slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    SimulatedSource,
    HardwareSource,
    Classifier,
    Sink,
    SessionLabel,
    DatasetDir,
    ModelPath,
}

/// Collaborators offered to a run
#[derive(Default)]
pub struct Collaborators {
    pub simulated: Option<SimulatedSource>,
    pub hardware: Option<Box<dyn SampleSource>>,
    pub classifier: Option<Box<dyn AmcClassifier>>,
    pub sink: Option<Box<dyn FeatureSink>>,
    pub label: Option<ModType>,
    pub dataset_dir: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
}

impl Collaborators {
    /// Slots that are filled
    pub fn present(&self) -> Vec<Collaborator> {
        let slots = [
            (Collaborator::SimulatedSource, self.simulated.is_some()),
            (Collaborator::HardwareSource, self.hardware.is_some()),
            (Collaborator::Classifier, self.classifier.is_some()),
            (Collaborator::Sink, self.sink.is_some()),
            (Collaborator::SessionLabel, self.label.is_some()),
            (Collaborator::DatasetDir, self.dataset_dir.is_some()),
            (Collaborator::ModelPath, self.model_path.is_some()),
        ];
        slots.into_iter().filter(|(_, filled)| *filled).map(|(slot, _)| slot).collect()
    }

    /// Build the collaborators `config.mode` needs.
    ///
    /// Slots whose settings are absent (e.g. no model path for a classifying
    /// mode) stay empty, and `MainRun::start` reports them.
    pub fn from_config(config: &AmcConfig) -> Result<Self, RunError> {
        let mut collaborators = Collaborators::default();
        let classifier_config = &config.classifier;

        match config.mode {
            RunMode::Classify | RunMode::TestClassifier => {
                collaborators.simulated = Some(SimulatedSource::new(config.source.clone(), config.simulated_mod_type)?);
                collaborators.classifier = load_configured(config)?;
            }
            RunMode::ClassifyFromHardware => {
                collaborators.hardware = Some(Box::new(CaptureReplaySource::open(config.replay.clone())?));
                collaborators.classifier = load_configured(config)?;
            }
            RunMode::CaptureData => {
                collaborators.simulated = Some(SimulatedSource::new(config.source.clone(), config.simulated_mod_type)?);
                collaborators.sink = Some(Box::new(FeatureFileWriter::new(config.capture.dir.clone())));
                collaborators.label = config.capture.label;
            }
            RunMode::TrainClassifier => {
                let classifier: Box<dyn AmcClassifier> = match classifier_config.kind {
                    ClassifierType::CustomTree => Box::new(DecisionTree::new(classifier_config.tree.clone())),
                    kind => create_classifier(kind),
                };
                collaborators.classifier = Some(classifier);
                collaborators.dataset_dir = Some(config.capture.dir.clone());
                collaborators.model_path = classifier_config.model_path.clone();
            }
            RunMode::Stopped => {}
        }
        Ok(collaborators)
    }
}

fn load_configured(config: &AmcConfig) -> Result<Option<Box<dyn AmcClassifier>>, RunError> {
    match &config.classifier.model_path {
        Some(path) => Ok(Some(load_classifier(config.classifier.kind, path)?)),
        None => {
            warn!("No classifier model_path configured");
            Ok(None)
        }
    }
}

/// Result of a successful start
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A streaming mode is running until `stop`
    Running,
    /// Training finished and the model was saved
    Trained(TrainingReport),
    /// Monte-Carlo trials finished
    Tested(MonteCarloReport),
}

struct ActiveRun {
    source: Box<dyn SampleSource>,
    extractor: FeatureExtractor,
}

/// Mode controller owning the active run
pub struct MainRun {
    extractor_config: ExtractorConfig,
    trainer_config: TrainerConfig,
    monte_carlo: MonteCarloConfig,
    mode: RunMode,
    active: Option<ActiveRun>,
}

impl MainRun {
    pub fn new(extractor_config: ExtractorConfig, trainer_config: TrainerConfig, monte_carlo: MonteCarloConfig) -> Self {
        Self {
            extractor_config,
            trainer_config,
            monte_carlo,
            mode: RunMode::Stopped,
            active: None,
        }
    }

    pub fn from_config(config: &AmcConfig) -> Self {
        Self::new(config.extractor.clone(), config.trainer.clone(), config.test.clone())
    }

    /// Check `collaborators` against `mode` and run it.
    ///
    /// Streaming modes return [`RunOutcome::Running`] and keep running until
    /// [`MainRun::stop`]; training and testing run to completion.
    pub fn start(&mut self, mode: RunMode, collaborators: Collaborators) -> Result<RunOutcome, RunError> {
        if self.active.is_some() {
            return Err(RunError::AlreadyRunning);
        }
        validate(mode, &collaborators)?;

        let Collaborators {
            simulated,
            hardware,
            classifier,
            sink,
            label,
            dataset_dir,
            model_path,
        } = collaborators;

        info!("Starting {}", mode);
        let outcome = match mode {
            RunMode::Classify => {
                let source = slot(simulated, mode, Collaborator::SimulatedSource)?;
                let classifier = slot(classifier, mode, Collaborator::Classifier)?;
                self.start_streaming(Box::new(source), ExtractionMode::Classify, Some(classifier), None)?;
                RunOutcome::Running
            }
            RunMode::ClassifyFromHardware => {
                let source = slot(hardware, mode, Collaborator::HardwareSource)?;
                let classifier = slot(classifier, mode, Collaborator::Classifier)?;
                self.start_streaming(source, ExtractionMode::Classify, Some(classifier), None)?;
                RunOutcome::Running
            }
            RunMode::CaptureData => {
                let source = slot(simulated, mode, Collaborator::SimulatedSource)?;
                let sink = slot(sink, mode, Collaborator::Sink)?;
                let label = slot(label, mode, Collaborator::SessionLabel)?;
                source.set_mod_type(label);
                self.start_streaming(Box::new(source), ExtractionMode::WriteToFile(label), None, Some(sink))?;
                RunOutcome::Running
            }
            RunMode::TrainClassifier => {
                let mut classifier = slot(classifier, mode, Collaborator::Classifier)?;
                let dataset_dir = slot(dataset_dir, mode, Collaborator::DatasetDir)?;
                let model_path = slot(model_path, mode, Collaborator::ModelPath)?;
                let trainer = ClassifierTrainer::new(self.trainer_config.clone());
                let report = trainer.train(classifier.as_mut(), &dataset_dir, &model_path)?;
                RunOutcome::Trained(report)
            }
            RunMode::TestClassifier => {
                let source = slot(simulated, mode, Collaborator::SimulatedSource)?;
                let classifier = slot(classifier, mode, Collaborator::Classifier)?;
                let tester = MonteCarloTester::new(self.monte_carlo.clone());
                let report = tester.run(source, classifier, &self.extractor_config)?;
                RunOutcome::Tested(report)
            }
            RunMode::Stopped => return Err(RunError::NotStartable(mode)),
        };

        if self.active.is_some() {
            self.mode = mode;
        }
        Ok(outcome)
    }

    fn start_streaming(
        &mut self,
        mut source: Box<dyn SampleSource>,
        extraction: ExtractionMode,
        classifier: Option<Box<dyn AmcClassifier>>,
        sink: Option<Box<dyn FeatureSink>>,
    ) -> Result<(), RunError> {
        let mut extractor = FeatureExtractor::new(
            source.buffer(),
            source.carrier_fraction(),
            source.bandwidth_fraction(),
            self.extractor_config.clone(),
        )?;
        if let Some(classifier) = classifier {
            extractor.set_classifier(classifier)?;
        }
        if let Some(sink) = sink {
            extractor.set_sink(sink)?;
        }

        extractor.start(extraction)?;
        if let Err(e) = source.start() {
            extractor.stop();
            return Err(e.into());
        }

        self.active = Some(ActiveRun { source, extractor });
        Ok(())
    }

    /// Stop the engine, then the source. No-op when nothing runs.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.extractor.stop();
            active.source.stop();
            info!("Stopped {}", self.mode);
        }
        self.mode = RunMode::Stopped;
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Smoothed label of the active run
    pub fn mod_type(&self) -> Option<ModType> {
        self.active.as_ref().and_then(|a| a.extractor.mod_type())
    }

    /// Most recent feature vector of the active run
    pub fn feature_vector(&self) -> Option<FeatureVector> {
        self.active.as_ref().and_then(|a| a.extractor.feature_vector())
    }

    /// Cell the active run publishes its smoothed label to
    pub fn shared_mod_type(&self) -> Option<Shared<Option<ModType>>> {
        self.active.as_ref().map(|a| a.extractor.shared_mod_type())
    }

    /// Cycles completed by the active run
    pub fn cycles(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.extractor.cycles())
    }
}

impl Drop for MainRun {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reject any collaborator set that differs from what `mode` needs
pub fn validate(mode: RunMode, collaborators: &Collaborators) -> Result<(), RunError> {
    let required = mode.required().ok_or(RunError::NotStartable(mode))?;
    let present = collaborators.present();

    let missing: Vec<Collaborator> = required.iter().copied().filter(|c| !present.contains(c)).collect();
    let unexpected: Vec<Collaborator> = present.into_iter().filter(|c| !required.contains(c)).collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(RunError::Mismatch {
            mode,
            missing,
            unexpected,
        });
    }

    if let Some(hardware) = &collaborators.hardware {
        if hardware.kind() != SourceKind::Hardware {
            return Err(RunError::WrongSourceKind(hardware.kind()));
        }
    }
    Ok(())
}

fn slot<T>(value: Option<T>, mode: RunMode, which: Collaborator) -> Result<T, RunError> {
    value.ok_or(RunError::Mismatch {
        mode,
        missing: vec![which],
        unexpected: Vec::new(),
    })
}

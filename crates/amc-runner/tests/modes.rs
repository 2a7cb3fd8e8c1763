//! Mode controller tests: collaborator validation and each mode end to end

use amc_runner::{
    Collaborator, Collaborators, MainRun, MonteCarloConfig, RunError, RunMode, RunOutcome, TrainerConfig,
};
use classifier::{AmcClassifier, ClassifierError, FeatureArray, ModType};
use feature_engine::ExtractorConfig;
use feature_store::{load_dataset, MemorySink};
use shared_state::{shared_buffer, Shared, SharedBuffer, SharedCell};
use signal_source::{SampleSource, SimulatedSource, SourceConfig, SourceError, SourceKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Returns the same label for every window
struct FixedClassifier(ModType);

impl AmcClassifier for FixedClassifier {
    fn classify(&self, _features: &FeatureArray) -> Result<ModType, ClassifierError> {
        Ok(self.0)
    }

    fn train(&mut self, _samples: &[FeatureArray], _responses: &[ModType]) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn save(&self, _path: &Path) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Source that never produces samples
struct IdleSource {
    kind: SourceKind,
    buffer: SharedBuffer,
    carrier: Shared<f64>,
    bandwidth: Shared<f64>,
}

impl IdleSource {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            buffer: shared_buffer(1024),
            carrier: SharedCell::shared(0.1),
            bandwidth: SharedCell::shared(0.1),
        }
    }
}

impl SampleSource for IdleSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn buffer(&self) -> SharedBuffer {
        self.buffer.clone()
    }

    fn carrier_fraction(&self) -> Shared<f64> {
        self.carrier.clone()
    }

    fn bandwidth_fraction(&self) -> Shared<f64> {
        self.bandwidth.clone()
    }

    fn start(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_running(&self) -> bool {
        false
    }
}

fn extractor_config() -> ExtractorConfig {
    ExtractorConfig {
        window_size: 256,
        history_size: 3,
        backoff_ms: 1,
        max_tasks: 2,
        record_raw_windows: false,
    }
}

fn simulated(mod_type: ModType) -> SimulatedSource {
    SimulatedSource::new(
        SourceConfig {
            frame_size: 256,
            buffer_capacity: 1024,
            seed: Some(5),
            ..SourceConfig::default()
        },
        mod_type,
    )
    .unwrap()
}

fn main_run() -> MainRun {
    MainRun::new(
        extractor_config(),
        TrainerConfig::default(),
        MonteCarloConfig {
            trials: 6,
            trial_timeout_ms: 5000,
            seed: Some(17),
        },
    )
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn assert_mismatch(result: Result<RunOutcome, RunError>, missing: &[Collaborator], unexpected: &[Collaborator]) {
    match result {
        Err(RunError::Mismatch {
            missing: m,
            unexpected: u,
            ..
        }) => {
            assert_eq!(m, missing);
            assert_eq!(u, unexpected);
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn classify_rejects_missing_classifier() {
    let mut run = main_run();
    let result = run.start(
        RunMode::Classify,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            ..Collaborators::default()
        },
    );
    assert_mismatch(result, &[Collaborator::Classifier], &[]);
    assert!(!run.is_running());
    assert_eq!(run.mode(), RunMode::Stopped);
}

#[test]
fn classify_rejects_extra_sink() {
    let mut run = main_run();
    let result = run.start(
        RunMode::Classify,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            classifier: Some(Box::new(FixedClassifier(ModType::Fm))),
            sink: Some(Box::new(MemorySink::new())),
            ..Collaborators::default()
        },
    );
    assert_mismatch(result, &[], &[Collaborator::Sink]);
}

#[test]
fn hardware_mode_rejects_simulated_source_slot() {
    let mut run = main_run();
    let result = run.start(
        RunMode::ClassifyFromHardware,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            classifier: Some(Box::new(FixedClassifier(ModType::Fm))),
            ..Collaborators::default()
        },
    );
    assert_mismatch(result, &[Collaborator::HardwareSource], &[Collaborator::SimulatedSource]);

    let result = run.start(
        RunMode::ClassifyFromHardware,
        Collaborators {
            hardware: Some(Box::new(IdleSource::new(SourceKind::Simulated))),
            classifier: Some(Box::new(FixedClassifier(ModType::Fm))),
            ..Collaborators::default()
        },
    );
    assert!(matches!(result, Err(RunError::WrongSourceKind(SourceKind::Simulated))));
}

#[test]
fn capture_rejects_missing_label() {
    let mut run = main_run();
    let result = run.start(
        RunMode::CaptureData,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            sink: Some(Box::new(MemorySink::new())),
            ..Collaborators::default()
        },
    );
    assert_mismatch(result, &[Collaborator::SessionLabel], &[]);
}

#[test]
fn train_rejects_source() {
    let mut run = main_run();
    let result = run.start(
        RunMode::TrainClassifier,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            classifier: Some(Box::new(FixedClassifier(ModType::Fm))),
            dataset_dir: Some(PathBuf::from("captures")),
            ..Collaborators::default()
        },
    );
    assert_mismatch(result, &[Collaborator::ModelPath], &[Collaborator::SimulatedSource]);
}

#[test]
fn test_mode_rejects_empty_set() {
    let mut run = main_run();
    let result = run.start(RunMode::TestClassifier, Collaborators::default());
    assert_mismatch(result, &[Collaborator::SimulatedSource, Collaborator::Classifier], &[]);
}

#[test]
fn classify_publishes_smoothed_label() {
    let mut run = main_run();
    let outcome = run
        .start(
            RunMode::Classify,
            Collaborators {
                simulated: Some(simulated(ModType::Psk2)),
                classifier: Some(Box::new(FixedClassifier(ModType::Mpsk))),
                ..Collaborators::default()
            },
        )
        .unwrap();
    assert_eq!(outcome, RunOutcome::Running);
    assert_eq!(run.mode(), RunMode::Classify);
    assert!(matches!(
        run.start(RunMode::Classify, Collaborators::default()),
        Err(RunError::AlreadyRunning)
    ));

    assert!(wait_for(|| run.mod_type() == Some(ModType::Mpsk)));
    assert!(run.feature_vector().is_some());

    run.stop();
    assert!(!run.is_running());
    assert_eq!(run.mode(), RunMode::Stopped);
    assert_eq!(run.mod_type(), None);
}

#[test]
fn capture_records_under_session_label() {
    let sink = MemorySink::new();
    let mut run = main_run();
    run.start(
        RunMode::CaptureData,
        Collaborators {
            simulated: Some(simulated(ModType::Fm)),
            sink: Some(Box::new(sink.clone())),
            label: Some(ModType::Ask2),
            ..Collaborators::default()
        },
    )
    .unwrap();

    assert!(wait_for(|| sink.feature_count() >= 3));
    run.stop();

    assert_eq!(sink.sessions_started(), 1);
    assert!(sink.features().iter().all(|r| r.label == ModType::Ask2));
}

#[test]
fn capture_then_train_through_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");

    for label in [ModType::Fm, ModType::Ask2] {
        let mut run = main_run();
        run.start(
            RunMode::CaptureData,
            Collaborators {
                simulated: Some(simulated(ModType::Fm)),
                sink: Some(Box::new(feature_store::FeatureFileWriter::new(captures.clone()))),
                label: Some(label),
                ..Collaborators::default()
            },
        )
        .unwrap();
        let start = run.cycles();
        assert!(wait_for(|| run.cycles() >= start + 20));
        run.stop();
    }
    assert!(load_dataset(&captures).unwrap().len() >= 40);

    let model_path = dir.path().join("tree.json");
    let mut run = main_run();
    let outcome = run
        .start(
            RunMode::TrainClassifier,
            Collaborators {
                classifier: Some(Box::new(classifier::DecisionTree::default())),
                dataset_dir: Some(captures),
                model_path: Some(model_path.clone()),
                ..Collaborators::default()
            },
        )
        .unwrap();

    match outcome {
        RunOutcome::Trained(report) => assert!(report.training_samples > 0),
        other => panic!("expected training report, got {:?}", other),
    }
    assert!(model_path.exists());
    assert!(!run.is_running());
}

#[test]
fn monte_carlo_scores_fixed_classifier() {
    let mut run = main_run();
    let outcome = run
        .start(
            RunMode::TestClassifier,
            Collaborators {
                simulated: Some(simulated(ModType::Fm)),
                classifier: Some(Box::new(FixedClassifier(ModType::Fm))),
                ..Collaborators::default()
            },
        )
        .unwrap();

    let RunOutcome::Tested(report) = outcome else {
        panic!("expected Monte-Carlo report");
    };
    assert_eq!(report.trials, 6);
    assert_eq!(report.unresolved, 0);
    assert_eq!(report.per_label.iter().map(|s| s.trials).sum::<usize>(), 6);

    let fm_trials = report
        .per_label
        .iter()
        .find(|s| s.label == ModType::Fm)
        .map_or(0, |s| s.trials);
    assert_eq!(report.correct, fm_trials);
    assert!(!run.is_running());
}

//! AMC Pipeline Runner
//!
//! Selects a run mode, wires sources, the feature engine, classifiers and
//! capture sinks together, trains classifiers from captured data and scores
//! them with Monte-Carlo trials.

pub mod config;
pub mod monte_carlo;
pub mod runner;
pub mod trainer;

pub use self::config::{load_config, AmcConfig, CaptureConfig, ClassifierConfig, LoggingConfig};
pub use monte_carlo::{LabelScore, MonteCarloConfig, MonteCarloReport, MonteCarloTester};
pub use runner::{Collaborator, Collaborators, MainRun, RunMode, RunOutcome};
pub use trainer::{ClassifierTrainer, TrainerConfig, TrainingReport};

use classifier::ClassifierError;
use feature_engine::ConfigurationError;
use feature_store::StoreError;
use signal_source::{SourceError, SourceKind};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Runner errors
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Mode {0} cannot be started")]
    NotStartable(RunMode),
    #[error("Mode {mode} collaborator mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    Mismatch {
        mode: RunMode,
        missing: Vec<Collaborator>,
        unexpected: Vec<Collaborator>,
    },
    #[error("Hardware slot holds a {0:?} source")]
    WrongSourceKind(SourceKind),
    #[error("A run is already active")]
    AlreadyRunning,
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error(transparent)]
    Engine(#[from] ConfigurationError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Install the global tracing subscriber.
///
/// Unknown level names fall back to `info`. A subscriber installed earlier
/// (e.g. by a test harness) is kept.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if result.is_err() {
        tracing::debug!("Global subscriber already set");
    }
}

//! Pipeline configuration
//!
//! Loaded from an optional TOML file, then overridden by `AMC_`-prefixed
//! environment variables; nested keys use `__`, e.g.
//! `AMC_EXTRACTOR__WINDOW_SIZE=2048`.

use crate::monte_carlo::MonteCarloConfig;
use crate::runner::RunMode;
use crate::trainer::TrainerConfig;
use crate::RunError;
use classifier::{ClassifierType, ModType, TreeParams};
use config::{Config, Environment, File};
use feature_engine::ExtractorConfig;
use serde::{Deserialize, Serialize};
use signal_source::{ReplayConfig, SourceConfig};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmcConfig {
    /// Mode the binary starts in
    pub mode: RunMode,
    /// Seconds a streaming mode runs before stopping
    pub run_seconds: u64,
    pub logging: LoggingConfig,
    pub classifier: ClassifierConfig,
    pub extractor: ExtractorConfig,
    pub source: SourceConfig,
    /// Modulation the simulated source starts with outside capture sessions
    pub simulated_mod_type: ModType,
    /// Capture replayed in `CLASSIFY_FROM_HARDWARE`
    pub replay: ReplayConfig,
    pub capture: CaptureConfig,
    pub trainer: TrainerConfig,
    pub test: MonteCarloConfig,
}

impl Default for AmcConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            run_seconds: 10,
            logging: LoggingConfig::default(),
            classifier: ClassifierConfig::default(),
            extractor: ExtractorConfig::default(),
            source: SourceConfig::default(),
            simulated_mod_type: ModType::Fm,
            replay: ReplayConfig::default(),
            capture: CaptureConfig::default(),
            trainer: TrainerConfig::default(),
            test: MonteCarloConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Max level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Classifier selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierType,
    /// Model to load, or to write when training
    pub model_path: Option<PathBuf>,
    /// Growth parameters of a freshly trained tree
    pub tree: TreeParams,
}

/// Capture session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory feature files are written to and trained from
    pub dir: PathBuf,
    /// Label of the captured modulation
    pub label: Option<ModType>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("captures"),
            label: None,
        }
    }
}

/// Load configuration from `path` (if given) and the environment
pub fn load_config(path: Option<&Path>) -> Result<AmcConfig, RunError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let settings = builder
        .add_source(
            Environment::with_prefix("AMC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

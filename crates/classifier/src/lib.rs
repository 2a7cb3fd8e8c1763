//! Modulation Classifier
//!
//! Defines the classifier contract the feature engine calls, the modulation
//! label set, and two decision-tree implementations: a native CART tree and an
//! ONNX-exported tree executed with tract.

mod mod_type;
mod onnx;
mod tree;

pub use mod_type::{ModType, ParseModTypeError};
pub use onnx::OnnxDecisionTree;
pub use tree::{DecisionTree, TreeParams};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of features the classifier consumes
pub const FEATURE_DIMENSION: usize = 9;

/// Fixed-order feature array handed to a classifier
pub type FeatureArray = [f64; FEATURE_DIMENSION];

/// Errors raised by classifier implementations
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model not loaded or trained")]
    NotReady,
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Model save failed: {0}")]
    ModelSave(String),
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Operation not supported by {0}")]
    Unsupported(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps a feature vector to a modulation label.
///
/// The feature engine only calls [`AmcClassifier::classify`]; training and
/// persistence belong to the trainer and the mode controller.
pub trait AmcClassifier: Send {
    /// Classify one feature vector
    fn classify(&self, features: &FeatureArray) -> Result<ModType, ClassifierError>;

    /// Fit the model to labeled samples
    fn train(&mut self, samples: &[FeatureArray], responses: &[ModType]) -> Result<(), ClassifierError>;

    /// Persist the model
    fn save(&self, path: &Path) -> Result<(), ClassifierError>;

    /// Restore a persisted model
    fn load(&mut self, path: &Path) -> Result<(), ClassifierError>;

    /// Short implementation name for logs
    fn name(&self) -> &'static str;
}

/// Available classifier implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierType {
    /// Native CART decision tree
    CustomTree,
    /// Library-trained tree exported to ONNX
    OnnxTree,
}

impl Default for ClassifierType {
    fn default() -> Self {
        Self::CustomTree
    }
}

/// Create an untrained classifier of the given type
pub fn create_classifier(kind: ClassifierType) -> Box<dyn AmcClassifier> {
    match kind {
        ClassifierType::CustomTree => Box::new(DecisionTree::new(TreeParams::default())),
        ClassifierType::OnnxTree => Box::new(OnnxDecisionTree::new()),
    }
}

/// Create a classifier and load its persisted model
pub fn load_classifier(kind: ClassifierType, path: &Path) -> Result<Box<dyn AmcClassifier>, ClassifierError> {
    let mut classifier = create_classifier(kind);
    classifier.load(path)?;
    Ok(classifier)
}

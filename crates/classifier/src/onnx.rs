//! Library-Backed Decision Tree (ONNX via tract)
//!
//! Runs a decision tree trained by an external ML library and exported to
//! ONNX. The model takes a `float32[1, 9]` input and its first output carries
//! the label index in `ModType` declaration order.

use crate::{AmcClassifier, ClassifierError, FeatureArray, ModType, FEATURE_DIMENSION};
use std::io::Cursor;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Decision tree executed from an ONNX model
pub struct OnnxDecisionTree {
    /// Optimized runnable plan
    plan: Option<OnnxPlan>,
    /// Raw model bytes, kept so the model can be saved elsewhere
    model_bytes: Vec<u8>,
}

impl OnnxDecisionTree {
    /// Create an empty classifier; call `load` before classifying
    pub fn new() -> Self {
        Self {
            plan: None,
            model_bytes: Vec::new(),
        }
    }

    /// Check if a model is loaded
    pub fn is_loaded(&self) -> bool {
        self.plan.is_some()
    }

    fn build_plan(bytes: &[u8]) -> TractResult<OnnxPlan> {
        let mut reader = Cursor::new(bytes);
        tract_onnx::onnx()
            .model_for_read(&mut reader)?
            .with_input_fact(0, f32::fact([1, FEATURE_DIMENSION]).into())?
            .into_optimized()?
            .into_runnable()
    }
}

impl Default for OnnxDecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AmcClassifier for OnnxDecisionTree {
    fn classify(&self, features: &FeatureArray) -> Result<ModType, ClassifierError> {
        let plan = self.plan.as_ref().ok_or(ClassifierError::NotReady)?;

        let input: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let tensor = Tensor::from_shape(&[1, FEATURE_DIMENSION], &input)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let outputs = plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let label = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference("model produced no outputs".to_string()))?;
        let label = label
            .cast_to::<i64>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let index = label
            .as_slice::<i64>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?
            .first()
            .copied()
            .ok_or_else(|| ClassifierError::Inference("empty label tensor".to_string()))?;

        debug!("ONNX tree produced label index {}", index);
        usize::try_from(index)
            .ok()
            .and_then(ModType::from_index)
            .ok_or_else(|| ClassifierError::Inference(format!("label index {} out of range", index)))
    }

    fn train(&mut self, _samples: &[FeatureArray], _responses: &[ModType]) -> Result<(), ClassifierError> {
        // Training happens in the library that exported the model
        Err(ClassifierError::Unsupported("onnx_tree"))
    }

    fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        if self.model_bytes.is_empty() {
            return Err(ClassifierError::NotReady);
        }
        std::fs::write(path, &self.model_bytes)?;
        info!("Saved ONNX tree to {}", path.display());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), ClassifierError> {
        let bytes = std::fs::read(path)?;
        let plan = Self::build_plan(&bytes).map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
        info!("Loaded ONNX tree from {} ({} bytes)", path.display(), bytes.len());
        self.plan = Some(plan);
        self.model_bytes = bytes;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "onnx_tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_before_load() {
        let tree = OnnxDecisionTree::new();
        assert!(!tree.is_loaded());
        assert!(matches!(tree.classify(&[0.0; FEATURE_DIMENSION]), Err(ClassifierError::NotReady)));
    }

    #[test]
    fn test_training_is_unsupported() {
        let mut tree = OnnxDecisionTree::new();
        let err = tree.train(&[[0.0; FEATURE_DIMENSION]], &[ModType::Fm]).unwrap_err();
        assert!(matches!(err, ClassifierError::Unsupported(_)));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not an onnx model").unwrap();

        let mut tree = OnnxDecisionTree::new();
        assert!(matches!(tree.load(&path), Err(ClassifierError::ModelLoad(_))));
        assert!(!tree.is_loaded());
    }

    #[test]
    fn test_save_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OnnxDecisionTree::new();
        assert!(matches!(tree.save(&dir.path().join("out.onnx")), Err(ClassifierError::NotReady)));
    }
}

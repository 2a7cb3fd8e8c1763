//! Classifier Training from Captured Features

use crate::RunError;
use classifier::{AmcClassifier, FeatureArray, ModType};
use feature_store::{load_dataset, Dataset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Trainer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Share of samples held out to measure accuracy (0 disables)
    pub holdout_fraction: f64,
    /// Shuffle seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            seed: None,
        }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub training_samples: usize,
    pub holdout_samples: usize,
    /// Records dropped while loading (unparsable or non-finite)
    pub skipped_records: usize,
    /// Share of held-out samples classified correctly
    pub holdout_accuracy: Option<f64>,
}

/// Trains a classifier on a capture directory and saves the model
pub struct ClassifierTrainer {
    config: TrainerConfig,
}

impl ClassifierTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Load `dataset_dir`, train, evaluate on the hold-out split and save to `model_path`
    pub fn train(
        &self,
        classifier: &mut dyn AmcClassifier,
        dataset_dir: &Path,
        model_path: &Path,
    ) -> Result<TrainingReport, RunError> {
        let dataset = load_dataset(dataset_dir)?;
        if dataset.is_empty() {
            return Err(RunError::Training(format!(
                "no usable feature records in {}",
                dataset_dir.display()
            )));
        }

        let report = self.train_dataset(classifier, dataset)?;
        classifier.save(model_path)?;
        info!("Saved {} model to {}", classifier.name(), model_path.display());
        Ok(report)
    }

    /// Shuffle, split, train and evaluate on an in-memory dataset
    pub fn train_dataset(&self, classifier: &mut dyn AmcClassifier, dataset: Dataset) -> Result<TrainingReport, RunError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut rng);

        let fraction = self.config.holdout_fraction.clamp(0.0, 0.9);
        let holdout_len = (dataset.len() as f64 * fraction).floor() as usize;
        let (holdout, training) = order.split_at(holdout_len);

        let pick = |indices: &[usize]| -> (Vec<FeatureArray>, Vec<ModType>) {
            indices
                .iter()
                .map(|&i| (dataset.samples[i], dataset.responses[i]))
                .unzip()
        };
        let (train_x, train_y) = pick(training);
        let (test_x, test_y) = pick(holdout);

        info!(
            "Training {} on {} samples ({} held out)",
            classifier.name(),
            train_x.len(),
            test_x.len()
        );
        classifier.train(&train_x, &train_y)?;

        let holdout_accuracy = if test_x.is_empty() {
            None
        } else {
            let correct = test_x
                .iter()
                .zip(test_y.iter())
                .filter(|(x, y)| match classifier.classify(x) {
                    Ok(label) => label == **y,
                    Err(e) => {
                        warn!("Hold-out classification failed: {}", e);
                        false
                    }
                })
                .count();
            Some(correct as f64 / test_x.len() as f64)
        };

        if let Some(accuracy) = holdout_accuracy {
            info!("Hold-out accuracy: {:.1}%", accuracy * 100.0);
        }

        Ok(TrainingReport {
            training_samples: train_x.len(),
            holdout_samples: test_x.len(),
            skipped_records: dataset.skipped,
            holdout_accuracy,
        })
    }
}

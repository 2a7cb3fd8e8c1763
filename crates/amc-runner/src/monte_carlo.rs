//! Monte-Carlo Classifier Test
//!
//! Switches the simulated source to a random modulation, lets the label
//! history refill with windows of that modulation only, and compares the
//! smoothed label with the truth.

use crate::RunError;
use classifier::{AmcClassifier, ModType};
use feature_engine::{ExtractionMode, ExtractorConfig, FeatureExtractor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use signal_source::{SampleSource, SimulatedSource};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Monte-Carlo test configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub trials: usize,
    /// Give up on a trial that has not settled after this long
    pub trial_timeout_ms: u64,
    /// Label draw seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trials: 24,
            trial_timeout_ms: 5000,
            seed: None,
        }
    }
}

/// Per-label tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: ModType,
    pub trials: usize,
    pub correct: usize,
}

/// Outcome of a Monte-Carlo run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloReport {
    pub trials: usize,
    pub correct: usize,
    /// Trials that timed out before the history refilled (scored wrong)
    pub unresolved: usize,
    /// Labels drawn at least once, in declaration order
    pub per_label: Vec<LabelScore>,
}

impl MonteCarloReport {
    /// Share of trials classified correctly
    pub fn accuracy(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.correct as f64 / self.trials as f64
        }
    }
}

pub struct MonteCarloTester {
    config: MonteCarloConfig,
}

impl MonteCarloTester {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    /// Run all trials against `classifier`, then stop the engine and the source
    pub fn run(
        &self,
        mut source: SimulatedSource,
        classifier: Box<dyn AmcClassifier>,
        extractor_config: &ExtractorConfig,
    ) -> Result<MonteCarloReport, RunError> {
        let mut extractor = FeatureExtractor::new(
            source.buffer(),
            source.carrier_fraction(),
            source.bandwidth_fraction(),
            extractor_config.clone(),
        )?;
        extractor.set_classifier(classifier)?;
        extractor.start(ExtractionMode::Classify)?;
        if let Err(e) = source.start() {
            extractor.stop();
            return Err(e.into());
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Frames until the buffer holds a full window of the new modulation,
        // plus one for a frame generated across the switch
        let frame_size = source.config().frame_size;
        let settle_frames = (extractor_config.window_size.div_ceil(frame_size) + 2) as u64;
        let settle_cycles = extractor_config.history_size as u64 + 1;
        let timeout = Duration::from_millis(self.config.trial_timeout_ms);

        let mut scores: Vec<LabelScore> = ModType::ALL
            .iter()
            .map(|&label| LabelScore {
                label,
                trials: 0,
                correct: 0,
            })
            .collect();
        let mut correct = 0;
        let mut unresolved = 0;

        info!("Running {} Monte-Carlo trials", self.config.trials);
        for trial in 0..self.config.trials {
            let Some(&truth) = ModType::ALL.choose(&mut rng) else {
                break;
            };
            let deadline = Instant::now() + timeout;

            source.set_mod_type(truth);
            let frames = source.frames_generated();
            let settled = wait_until(deadline, || source.frames_generated() >= frames + settle_frames) && {
                let cycles = extractor.cycles();
                wait_until(deadline, || extractor.cycles() >= cycles + settle_cycles)
            };

            let score = &mut scores[truth.index()];
            score.trials += 1;
            if !settled {
                warn!("Trial {} ({}) timed out", trial, truth);
                unresolved += 1;
                continue;
            }

            let predicted = extractor.mod_type();
            debug!("Trial {}: truth {}, predicted {:?}", trial, truth, predicted);
            if predicted == Some(truth) {
                score.correct += 1;
                correct += 1;
            }
        }

        extractor.stop();
        source.stop();

        let report = MonteCarloReport {
            trials: self.config.trials,
            correct,
            unresolved,
            per_label: scores.into_iter().filter(|s| s.trials > 0).collect(),
        };
        info!(
            "Monte-Carlo accuracy {:.1}% ({}/{}, {} unresolved)",
            report.accuracy() * 100.0,
            report.correct,
            report.trials,
            report.unresolved
        );
        Ok(report)
    }
}

fn wait_until(deadline: Instant, mut condition: impl FnMut() -> bool) -> bool {
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

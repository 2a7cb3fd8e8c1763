//! Per-Cycle Feature Computation
//!
//! One cycle turns a normalized-centered window into a [`FeatureVector`]. The
//! work is split into two branches that run concurrently on a bounded rayon
//! pool, each forking further:
//!
//! ```text
//! amplitude:  normalize(center(x)) ─┬─ σ, μ42            → sigmaA, mu42A
//!                                   └─ |x| → σ           → sigmaAA
//! spectral:   FFT(x) ─┬─ max power, symmetry             → gammaMax, P
//!                     └─ analytic → phase → unwrap ─┬─ detrend → σ, σ(|·|) → sigmaDP, sigmaAP
//!                                                   └─ diff → normalize → center → σ, μ42 → sigmaAF, mu42F
//! ```
//!
//! Intermediate signals shared between tasks live in individually locked
//! scratch cells. A task holds a guard only while it copies or computes;
//! every guard is dropped before the task forks or joins. Whole cycles are
//! serialized by a separate lock, so callers sharing one pipeline never see
//! each other's scratch.

use crate::features::FeatureVector;
use crate::fft::{self, SpectrumAnalyzer};
use crate::phase;
use crate::statistics;
use crate::ConfigurationError;
use num_complex::Complex64;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use shared_state::SharedCell;
use tracing::debug;

/// Smallest window the spectral features are defined for
pub const MIN_WINDOW_SIZE: usize = 4;

struct AmplitudeFeatures {
    sigma_a: f64,
    mu42_a: f64,
    sigma_aa: f64,
}

struct SpectralFeatures {
    gamma_max: f64,
    p: f64,
    sigma_dp: f64,
    sigma_ap: f64,
    mu42_f: f64,
    sigma_af: f64,
}

/// Feature computation for a fixed window size
pub struct FeaturePipeline {
    window_size: usize,
    analyzer: SpectrumAnalyzer,
    pool: ThreadPool,
    cycle: Mutex<()>,
    norm_center: SharedCell<Vec<Complex64>>,
    spectrum: SharedCell<Vec<Complex64>>,
    unwrapped: SharedCell<Vec<f64>>,
    nonlinear: SharedCell<Vec<f64>>,
}

impl FeaturePipeline {
    /// Plan FFTs for `window_size` and build a pool of `max_tasks` threads
    pub fn new(window_size: usize, max_tasks: usize) -> Result<Self, ConfigurationError> {
        if window_size < MIN_WINDOW_SIZE {
            return Err(ConfigurationError::InvalidWindowSize(window_size));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_tasks.max(1))
            .thread_name(|i| format!("amc-feature-{}", i))
            .build()
            .map_err(|e| ConfigurationError::ThreadPool(e.to_string()))?;

        debug!(
            "Feature pipeline ready: window {} samples, {} tasks",
            window_size,
            pool.current_num_threads()
        );

        Ok(Self {
            window_size,
            analyzer: SpectrumAnalyzer::new(window_size),
            pool,
            cycle: Mutex::new(()),
            norm_center: SharedCell::new(vec![Complex64::default(); window_size]),
            spectrum: SharedCell::new(vec![Complex64::default(); window_size]),
            unwrapped: SharedCell::new(vec![0.0; window_size]),
            nonlinear: SharedCell::new(vec![0.0; window_size]),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Carrier offset in FFT bins, `round(fc · N)`
    pub fn carrier_bin(&self, carrier_fraction: f64) -> i64 {
        (carrier_fraction * self.window_size as f64).round() as i64
    }

    /// Compute the features of an already normalized-centered window.
    ///
    /// The bandwidth estimate is read under its lock by the symmetry task.
    ///
    /// # Panics
    ///
    /// If `window.len()` differs from the pipeline's window size.
    pub fn process(&self, window: &[Complex64], carrier_fraction: f64, bandwidth: &SharedCell<f64>) -> FeatureVector {
        let fnc = self.carrier_bin(carrier_fraction);
        let _cycle = self.cycle.lock();

        let (amplitude, spectral) = self.pool.join(
            || self.amplitude_branch(window),
            || self.spectral_branch(window, fnc, bandwidth),
        );

        FeatureVector {
            mu42_f: spectral.mu42_f,
            sigma_af: spectral.sigma_af,
            sigma_dp: spectral.sigma_dp,
            sigma_ap: spectral.sigma_ap,
            gamma_max: spectral.gamma_max,
            p: spectral.p,
            sigma_a: amplitude.sigma_a,
            mu42_a: amplitude.mu42_a,
            sigma_aa: amplitude.sigma_aa,
        }
    }

    /// Normalize-center a raw window and compute its features
    pub fn process_window(&self, raw: &[Complex64], carrier_fraction: f64, bandwidth_fraction: f64) -> FeatureVector {
        let window = statistics::normalize_center(raw);
        self.process(&window, carrier_fraction, &SharedCell::new(bandwidth_fraction))
    }

    fn amplitude_branch(&self, window: &[Complex64]) -> AmplitudeFeatures {
        self.norm_center.set(statistics::normalize_center(window));

        let ((sigma_a, mu42_a), sigma_aa) = rayon::join(
            || {
                let x = self.norm_center.read();
                statistics::std_dev_kurtosis(x.as_slice())
            },
            || {
                let magnitude = statistics::magnitude(self.norm_center.read().as_slice());
                statistics::std_dev(&magnitude)
            },
        );

        AmplitudeFeatures {
            sigma_a,
            mu42_a,
            sigma_aa,
        }
    }

    fn spectral_branch(&self, window: &[Complex64], fnc: i64, bandwidth: &SharedCell<f64>) -> SpectralFeatures {
        self.spectrum.set(self.analyzer.forward(window));

        let ((gamma_max, p), (sigma_dp, sigma_ap, mu42_f, sigma_af)) = rayon::join(
            || {
                let spectrum = self.spectrum.read();
                let (gamma_max, _) = fft::max_power(spectrum.as_slice());
                let bw = *bandwidth.read();
                (gamma_max, fft::symmetry(spectrum.as_slice(), fnc, bw))
            },
            || self.phase_path(fnc),
        );

        SpectralFeatures {
            gamma_max,
            p,
            sigma_dp,
            sigma_ap,
            mu42_f,
            sigma_af,
        }
    }

    /// Analytic phase features: `(sigmaDP, sigmaAP, mu42F, sigmaAF)`
    fn phase_path(&self, fnc: i64) -> (f64, f64, f64, f64) {
        let analytic_spectrum = fft::remove_negative_frequencies(self.spectrum.read().as_slice());
        let analytic = self.analyzer.inverse(&analytic_spectrum);
        self.unwrapped.set(phase::unwrap_phase(&phase::phase(&analytic)));

        let ((sigma_dp, sigma_ap), (sigma_af, mu42_f)) = rayon::join(
            || self.nonlinear_phase(fnc),
            || {
                let inst_freq = statistics::differentiate(self.unwrapped.read().as_slice());
                // Normalized before centering: σ is std/rms of the frequency
                statistics::std_dev_kurtosis(&statistics::center(&statistics::normalize(&inst_freq)))
            },
        );

        (sigma_dp, sigma_ap, mu42_f, sigma_af)
    }

    /// `(sigmaDP, sigmaAP)` of the carrier-detrended phase
    fn nonlinear_phase(&self, fnc: i64) -> (f64, f64) {
        let residual = phase::remove_linear_phase(self.unwrapped.read().as_slice(), fnc);
        self.nonlinear.set(residual);

        rayon::join(
            || statistics::std_dev(self.nonlinear.read().as_slice()),
            || {
                let magnitude = statistics::magnitude(self.nonlinear.read().as_slice());
                statistics::std_dev(&magnitude)
            },
        )
    }
}

//! FFT-based Spectral Analysis

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Forward and inverse FFT plans for one window size.
///
/// Plans are immutable and `Sync`, so one analyzer serves every task of a
/// cycle without locking.
pub struct SpectrumAnalyzer {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    size: usize,
}

impl SpectrumAnalyzer {
    /// Plan transforms for windows of `size` samples
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            size,
        }
    }

    /// Transform size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform (unnormalized)
    pub fn forward(&self, x: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(x.len(), self.size, "window length {} != FFT size {}", x.len(), self.size);
        let mut buffer = x.to_vec();
        self.forward.process(&mut buffer);
        buffer
    }

    /// Inverse transform, scaled by 1/N so that `inverse(forward(x)) == x`
    pub fn inverse(&self, spectrum: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(
            spectrum.len(),
            self.size,
            "spectrum length {} != FFT size {}",
            spectrum.len(),
            self.size
        );
        let mut buffer = spectrum.to_vec();
        self.inverse.process(&mut buffer);
        let scale = 1.0 / self.size as f64;
        for v in buffer.iter_mut() {
            *v *= scale;
        }
        buffer
    }

    /// Analytic signal of `x` (negative frequencies removed)
    pub fn analytic(&self, x: &[Complex64]) -> Vec<Complex64> {
        self.inverse(&remove_negative_frequencies(&self.forward(x)))
    }
}

/// Zero the negative-frequency half of a spectrum and double the positive half.
///
/// DC, and the Nyquist bin of an even-length spectrum, are kept as they are,
/// so the inverse transform is the analytic signal.
pub fn remove_negative_frequencies(spectrum: &[Complex64]) -> Vec<Complex64> {
    let n = spectrum.len();
    let half = n / 2;
    spectrum
        .iter()
        .enumerate()
        .map(|(k, &v)| {
            if k == 0 || (n % 2 == 0 && k == half) {
                v
            } else if k < (n + 1) / 2 {
                v * 2.0
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect()
}

/// Maximum spectral power `max |X[k]|² / N` and the bin where it occurs
pub fn max_power(spectrum: &[Complex64]) -> (f64, usize) {
    if spectrum.is_empty() {
        return (0.0, 0);
    }
    let n = spectrum.len() as f64;
    let mut best = (f64::NEG_INFINITY, 0);
    for (k, v) in spectrum.iter().enumerate() {
        let power = v.norm_sqr() / n;
        if power > best.0 {
            best = (power, k);
        }
    }
    // All-NaN spectra never compare greater
    if best.0 == f64::NEG_INFINITY {
        return (f64::NAN, 0);
    }
    best
}

/// Spectral symmetry about the carrier.
///
/// Compares the power in the `B` bins below the carrier bin with the `B` bins
/// above it, `B = round(bandwidth·N/2)` clamped to `[1, (N-1)/2]`:
/// `P = (PL − PU) / (PL + PU)`. Indices wrap modulo N, so a carrier near DC
/// mirrors across the negative frequencies. `P` is 0 for a symmetric
/// spectrum, +1 for power only below the carrier, −1 for power only above.
pub fn symmetry(spectrum: &[Complex64], carrier_bin: i64, bandwidth: f64) -> f64 {
    let n = spectrum.len();
    if n < 3 {
        return 0.0;
    }
    let max_half = ((n - 1) / 2) as f64;
    let half_band = (bandwidth * n as f64 / 2.0).round().clamp(1.0, max_half) as i64;
    let len = n as i64;
    let carrier = carrier_bin.rem_euclid(len);

    let bin_power = |k: i64| spectrum[k.rem_euclid(len) as usize].norm_sqr();
    let lower: f64 = (1..=half_band).map(|k| bin_power(carrier - k)).sum();
    let upper: f64 = (1..=half_band).map(|k| bin_power(carrier + k)).sum();

    (lower - upper) / (lower + upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(n: usize, bin: f64) -> Vec<Complex64> {
        (0..n)
            .map(|i| Complex64::from_polar(1.0, 2.0 * PI * bin * i as f64 / n as f64))
            .collect()
    }

    #[test]
    fn test_forward_inverse_identity() {
        let analyzer = SpectrumAnalyzer::new(64);
        let x: Vec<Complex64> = (0..64).map(|i| Complex64::new(i as f64, (i * i) as f64 * 0.01)).collect();
        let back = analyzer.inverse(&analyzer.forward(&x));
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_tone_power_peak() {
        let analyzer = SpectrumAnalyzer::new(128);
        let spectrum = analyzer.forward(&tone(128, 10.0));
        let (power, bin) = max_power(&spectrum);

        assert_eq!(bin, 10);
        // |X|² = N² for a unit tone, divided by N
        assert!((power - 128.0).abs() < 1e-6);
    }

    #[test]
    fn test_remove_negative_frequencies_of_real_cosine() {
        // cos splits between +bin and -bin; the analytic signal is the +bin phasor
        let n = 64;
        let analyzer = SpectrumAnalyzer::new(n);
        let cosine: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((2.0 * PI * 4.0 * i as f64 / n as f64).cos(), 0.0))
            .collect();
        let analytic = analyzer.analytic(&cosine);
        let expected = tone(n, 4.0);
        for (a, b) in analytic.iter().zip(expected.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_remove_negative_frequencies_odd_length() {
        let spectrum = vec![Complex64::new(1.0, 0.0); 5];
        let out = remove_negative_frequencies(&spectrum);
        let re: Vec<f64> = out.iter().map(|v| v.re).collect();
        assert_eq!(re, vec![1.0, 2.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_symmetry_sign() {
        let n = 128;
        let analyzer = SpectrumAnalyzer::new(n);
        let carrier = 20;

        let below = analyzer.forward(&tone(n, (carrier - 3) as f64));
        assert!((symmetry(&below, carrier, 0.1) - 1.0).abs() < 1e-9);

        let above = analyzer.forward(&tone(n, (carrier + 3) as f64));
        assert!((symmetry(&above, carrier, 0.1) + 1.0).abs() < 1e-9);

        let mut both = tone(n, (carrier - 3) as f64);
        for (v, u) in both.iter_mut().zip(tone(n, (carrier + 3) as f64)) {
            *v += u;
        }
        assert!(symmetry(&analyzer.forward(&both), carrier, 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_symmetry_wraps_around_dc() {
        let n = 64;
        let analyzer = SpectrumAnalyzer::new(n);
        // Bin -2 lives at index n-2
        let spectrum = analyzer.forward(&tone(n, -2.0));
        assert!((symmetry(&spectrum, 0, 0.2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_spectrum() {
        assert_eq!(max_power(&[]), (0.0, 0));
        assert_eq!(symmetry(&[], 0, 0.5), 0.0);
    }
}

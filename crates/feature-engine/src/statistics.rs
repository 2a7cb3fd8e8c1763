//! Moment Statistics over Real and Complex Sequences

use num_complex::Complex64;
use std::iter::Sum;
use std::ops::{Div, Sub};

/// A sample the moment statistics can operate on (real or complex)
pub trait Sample: Copy + Default + Sum + Sub<Output = Self> + Div<f64, Output = Self> {
    /// Squared magnitude |x|²
    fn power(self) -> f64;

    /// Magnitude |x|
    fn magnitude(self) -> f64 {
        self.power().sqrt()
    }
}

impl Sample for f64 {
    fn power(self) -> f64 {
        self * self
    }

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl Sample for Complex64 {
    fn power(self) -> f64 {
        self.norm_sqr()
    }

    fn magnitude(self) -> f64 {
        self.norm()
    }
}

/// Arithmetic mean (zero for an empty sequence)
pub fn mean<S: Sample>(x: &[S]) -> S {
    if x.is_empty() {
        return S::default();
    }
    x.iter().copied().sum::<S>() / x.len() as f64
}

/// Subtract the mean from every sample
pub fn center<S: Sample>(x: &[S]) -> Vec<S> {
    let m = mean(x);
    x.iter().map(|&v| v - m).collect()
}

/// Scale to unit RMS energy.
///
/// A zero-energy input divides by zero and yields NaN samples; callers that
/// feed silence get indeterminate features rather than a masked value.
pub fn normalize<S: Sample>(x: &[S]) -> Vec<S> {
    if x.is_empty() {
        return Vec::new();
    }
    let rms = (x.iter().map(|v| v.power()).sum::<f64>() / x.len() as f64).sqrt();
    x.iter().map(|&v| v / rms).collect()
}

/// `normalize(center(x))`: zero mean, unit RMS. Idempotent.
pub fn normalize_center<S: Sample>(x: &[S]) -> Vec<S> {
    normalize(&center(x))
}

/// Magnitude of every sample
pub fn magnitude<S: Sample>(x: &[S]) -> Vec<f64> {
    x.iter().map(|v| v.magnitude()).collect()
}

/// First difference `x[n+1] - x[n]` (one sample shorter than the input)
pub fn differentiate(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Population standard deviation
pub fn std_dev<S: Sample>(x: &[S]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    (x.iter().map(|&v| (v - m).power()).sum::<f64>() / x.len() as f64).sqrt()
}

/// Standard deviation and normalized fourth moment in one pass.
///
/// With `d = x - mean(x)`: `σ = sqrt(E|d|²)` and `μ42 = E|d|⁴ / (E|d|²)²`.
/// A zero-variance (constant) sequence gives `(0, 0)`; so does an empty one.
/// NaN input propagates to both outputs.
pub fn std_dev_kurtosis<S: Sample>(x: &[S]) -> (f64, f64) {
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let n = x.len() as f64;
    let m = mean(x);

    let mut m2 = 0.0;
    let mut m4 = 0.0;
    for &v in x {
        let p = (v - m).power();
        m2 += p;
        m4 += p * p;
    }
    m2 /= n;
    m4 /= n;

    let kurtosis = if m2 == 0.0 { 0.0 } else { m4 / (m2 * m2) };
    (m2.sqrt(), kurtosis)
}

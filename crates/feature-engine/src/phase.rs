//! Instantaneous Phase Processing

use num_complex::Complex64;
use std::f64::consts::PI;

/// Wrapped phase of every sample in (-π, π]
pub fn phase(x: &[Complex64]) -> Vec<f64> {
    x.iter().map(|v| v.arg()).collect()
}

/// Remove 2π discontinuities so consecutive samples differ by at most π.
///
/// Each step is mapped into (-π, π] and the correction accumulated, so jumps
/// of several turns are handled as well as single wraps.
pub fn unwrap_phase(wrapped: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(wrapped.len());
    let mut correction = 0.0;

    for (i, &x) in wrapped.iter().enumerate() {
        if i > 0 {
            let step = x - wrapped[i - 1];
            if step.abs() > PI {
                let mut folded = (step + PI).rem_euclid(2.0 * PI) - PI;
                if folded == -PI && step > 0.0 {
                    folded = PI;
                }
                correction += folded - step;
            }
        }
        out.push(x + correction);
    }
    out
}

/// Remove the linear phase ramp of a carrier at `carrier_bin`, then center.
///
/// A carrier `carrier_bin` FFT bins away from DC advances the phase by
/// `2π·carrier_bin/N` per sample; what remains is the modulation's
/// non-linear phase component.
pub fn remove_linear_phase(unwrapped: &[f64], carrier_bin: i64) -> Vec<f64> {
    let n = unwrapped.len();
    if n == 0 {
        return Vec::new();
    }
    let slope = 2.0 * PI * carrier_bin as f64 / n as f64;
    let detrended: Vec<f64> = unwrapped
        .iter()
        .enumerate()
        .map(|(i, &p)| p - slope * i as f64)
        .collect();
    crate::statistics::center(&detrended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_monotonic_ramp() {
        let ramp: Vec<f64> = (0..100).map(|i| 0.4 * i as f64).collect();
        let wrapped: Vec<f64> = ramp.iter().map(|p| Complex64::from_polar(1.0, *p).arg()).collect();
        let unwrapped = unwrap_phase(&wrapped);

        for (a, b) in unwrapped.iter().zip(ramp.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unwrap_descending_ramp() {
        let ramp: Vec<f64> = (0..100).map(|i| 1.0 - 0.7 * i as f64).collect();
        let wrapped: Vec<f64> = ramp.iter().map(|p| Complex64::from_polar(1.0, *p).arg()).collect();
        let unwrapped = unwrap_phase(&wrapped);

        for (a, b) in unwrapped.iter().zip(ramp.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unwrap_is_idempotent() {
        let wrapped = vec![0.0, 1.0, 2.0, 3.0, -3.0, -2.0, -1.0, 0.0];
        let once = unwrap_phase(&wrapped);
        assert_eq!(unwrap_phase(&once), once);
        for w in once.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_remove_linear_phase_of_pure_carrier() {
        let n = 64;
        let bin = 5;
        let carrier: Vec<f64> = (0..n).map(|i| 0.3 + 2.0 * PI * bin as f64 * i as f64 / n as f64).collect();
        let residual = remove_linear_phase(&carrier, bin);

        assert_eq!(residual.len(), n);
        assert!(residual.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_phase_of_axes() {
        let x = vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0), Complex64::new(-1.0, 0.0)];
        let p = phase(&x);
        assert!((p[0]).abs() < 1e-12);
        assert!((p[1] - PI / 2.0).abs() < 1e-12);
        assert!((p[2] - PI).abs() < 1e-12);
    }
}

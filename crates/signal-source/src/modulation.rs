//! Baseband Waveform Synthesis
//!
//! Generates complex baseband samples for every [`ModType`], then mixes them
//! up to a carrier and adds white Gaussian noise.

use classifier::ModType;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Modulation index of full-carrier AM
const AM_INDEX: f64 = 0.5;
/// Peak FM deviation as a fraction of the sample rate
const FM_DEVIATION: f64 = 0.02;
const MPSK_ORDER: usize = 8;
const MASK_LEVELS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];
const ASK2_LEVELS: [f64; 2] = [0.2, 1.0];
const QAM16_AXIS: [f64; 4] = [-3.0, -1.0, 1.0, 3.0];
/// Message tone amplitudes (sum ≤ 1 keeps full-carrier AM above zero)
const TONE_AMPLITUDES: [f64; 2] = [0.6, 0.4];
/// Second message tone relative to the first
const TONE_RATIO: f64 = 1.7;

/// Message and symbol-stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformParams {
    /// Samples per digital symbol
    pub samples_per_symbol: usize,
    /// Analog message tone as a fraction of the sample rate
    pub message_frequency: f64,
}

impl Default for WaveformParams {
    fn default() -> Self {
        Self {
            samples_per_symbol: 8,
            message_frequency: 0.005,
        }
    }
}

/// Stateful baseband generator for one modulation.
///
/// Phase and symbol timing carry over between frames, so consecutive frames
/// join without discontinuities.
pub struct Waveform {
    mod_type: ModType,
    params: WaveformParams,
    rng: StdRng,
    n: u64,
    tone_phases: [f64; 2],
    fm_phase: f64,
    symbol: Complex64,
    symbol_remaining: usize,
}

impl Waveform {
    pub fn new(mod_type: ModType, params: WaveformParams, mut rng: StdRng) -> Self {
        let tone_phases = [rng.gen_range(0.0..2.0 * PI), rng.gen_range(0.0..2.0 * PI)];
        Self {
            mod_type,
            params: WaveformParams {
                samples_per_symbol: params.samples_per_symbol.max(1),
                ..params
            },
            rng,
            n: 0,
            tone_phases,
            fm_phase: 0.0,
            symbol: Complex64::new(1.0, 0.0),
            symbol_remaining: 0,
        }
    }

    pub fn mod_type(&self) -> ModType {
        self.mod_type
    }

    /// Next `len` baseband samples
    pub fn next_frame(&mut self, len: usize) -> Vec<Complex64> {
        (0..len).map(|_| self.next_sample()).collect()
    }

    /// Analytic two-tone message at the current sample
    fn message(&self) -> Complex64 {
        let w = 2.0 * PI * self.params.message_frequency;
        let t = self.n as f64;
        Complex64::from_polar(TONE_AMPLITUDES[0], w * t + self.tone_phases[0])
            + Complex64::from_polar(TONE_AMPLITUDES[1], TONE_RATIO * w * t + self.tone_phases[1])
    }

    fn next_sample(&mut self) -> Complex64 {
        let m = self.message();
        let one = Complex64::new(1.0, 0.0);

        let sample = match self.mod_type {
            ModType::AmDsbFc => Complex64::new(1.0 + AM_INDEX * m.re, 0.0),
            ModType::AmDsbSc => Complex64::new(m.re, 0.0),
            ModType::AmUsbFc => one + m * AM_INDEX,
            ModType::AmUsbSc => m,
            ModType::AmLsbFc => one + m.conj() * AM_INDEX,
            ModType::AmLsbSc => m.conj(),
            ModType::Fm => {
                self.fm_phase = (self.fm_phase + 2.0 * PI * FM_DEVIATION * m.re).rem_euclid(2.0 * PI);
                Complex64::from_polar(1.0, self.fm_phase)
            }
            ModType::Mpsk | ModType::Psk2 | ModType::Mask | ModType::Ask2 | ModType::Mqam => self.symbol_sample(),
        };

        self.n += 1;
        sample
    }

    fn symbol_sample(&mut self) -> Complex64 {
        if self.symbol_remaining == 0 {
            self.symbol = self.draw_symbol();
            self.symbol_remaining = self.params.samples_per_symbol;
        }
        self.symbol_remaining -= 1;
        self.symbol
    }

    fn draw_symbol(&mut self) -> Complex64 {
        match self.mod_type {
            ModType::Mpsk => {
                let k = self.rng.gen_range(0..MPSK_ORDER);
                Complex64::from_polar(1.0, 2.0 * PI * k as f64 / MPSK_ORDER as f64)
            }
            ModType::Psk2 => Complex64::new(if self.rng.gen::<bool>() { 1.0 } else { -1.0 }, 0.0),
            ModType::Mask => Complex64::new(MASK_LEVELS[self.rng.gen_range(0..MASK_LEVELS.len())], 0.0),
            ModType::Ask2 => Complex64::new(ASK2_LEVELS[self.rng.gen_range(0..ASK2_LEVELS.len())], 0.0),
            ModType::Mqam => {
                let i = QAM16_AXIS[self.rng.gen_range(0..4)];
                let q = QAM16_AXIS[self.rng.gen_range(0..4)];
                // Unit average power
                Complex64::new(i, q) / 10f64.sqrt()
            }
            _ => Complex64::new(1.0, 0.0),
        }
    }
}

/// Shift a frame up by `carrier_fraction` of the sample rate.
///
/// `phase` carries the oscillator between frames.
pub fn mix(frame: &mut [Complex64], carrier_fraction: f64, phase: &mut f64) {
    let step = 2.0 * PI * carrier_fraction;
    for sample in frame.iter_mut() {
        *sample *= Complex64::from_polar(1.0, *phase);
        *phase = (*phase + step).rem_euclid(2.0 * PI);
    }
}

/// Add complex white Gaussian noise at `snr_db` relative to the frame's power
pub fn add_awgn(frame: &mut [Complex64], snr_db: f64, rng: &mut StdRng) {
    if frame.is_empty() {
        return;
    }
    let signal_power = frame.iter().map(|s| s.norm_sqr()).sum::<f64>() / frame.len() as f64;
    let snr_linear = 10f64.powf(snr_db / 10.0);
    // Split between I and Q
    let noise_std = (signal_power / snr_linear / 2.0).sqrt();

    let Ok(noise) = Normal::new(0.0, noise_std) else {
        return;
    };
    for sample in frame.iter_mut() {
        *sample += Complex64::new(noise.sample(rng), noise.sample(rng));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn waveform(mod_type: ModType, seed: u64) -> Waveform {
        Waveform::new(mod_type, WaveformParams::default(), StdRng::seed_from_u64(seed))
    }

    /// Power at a normalized frequency via a single DFT bin
    fn tone_power(x: &[Complex64], frequency: f64) -> f64 {
        let sum: Complex64 = x
            .iter()
            .enumerate()
            .map(|(n, v)| v * Complex64::from_polar(1.0, -2.0 * PI * frequency * n as f64))
            .sum();
        sum.norm_sqr() / x.len() as f64
    }

    #[test]
    fn test_constant_envelope_modulations() {
        for mod_type in [ModType::Fm, ModType::Mpsk, ModType::Psk2] {
            let frame = waveform(mod_type, 1).next_frame(512);
            assert!(
                frame.iter().all(|s| (s.norm() - 1.0).abs() < 1e-9),
                "{} is not constant envelope",
                mod_type
            );
        }
    }

    #[test]
    fn test_full_carrier_am_stays_positive() {
        let frame = waveform(ModType::AmDsbFc, 2).next_frame(4096);
        assert!(frame.iter().all(|s| s.re > 0.0 && s.im == 0.0));
    }

    #[test]
    fn test_single_sideband_is_one_sided() {
        let f = WaveformParams::default().message_frequency;
        let usb = waveform(ModType::AmUsbSc, 3).next_frame(2000);
        assert!(tone_power(&usb, f) > 100.0 * tone_power(&usb, -f));

        let lsb = waveform(ModType::AmLsbSc, 3).next_frame(2000);
        assert!(tone_power(&lsb, -f) > 100.0 * tone_power(&lsb, f));
    }

    #[test]
    fn test_symbol_alphabets() {
        let mut qam = waveform(ModType::Mqam, 4);
        for s in qam.next_frame(800) {
            let scaled = s * 10f64.sqrt();
            assert!(QAM16_AXIS.iter().any(|a| (a - scaled.re).abs() < 1e-9));
            assert!(QAM16_AXIS.iter().any(|a| (a - scaled.im).abs() < 1e-9));
        }

        let mut ask = waveform(ModType::Ask2, 4);
        for s in ask.next_frame(800) {
            assert!(ASK2_LEVELS.contains(&s.re));
        }
    }

    #[test]
    fn test_symbols_hold_for_symbol_period() {
        let frame = waveform(ModType::Mask, 5).next_frame(64);
        for chunk in frame.chunks(8) {
            assert!(chunk.iter().all(|s| *s == chunk[0]));
        }
    }

    #[test]
    fn test_seeded_generation_is_repeatable() {
        let a = waveform(ModType::Mqam, 42).next_frame(256);
        let b = waveform(ModType::Mqam, 42).next_frame(256);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mix_moves_energy_to_carrier() {
        let mut frame = vec![Complex64::new(1.0, 0.0); 1000];
        let mut phase = 0.0;
        mix(&mut frame, 0.1, &mut phase);
        assert!((tone_power(&frame, 0.1) - 1000.0).abs() < 1e-6);
        assert!(tone_power(&frame, 0.0) < 1e-6);
    }

    #[test]
    fn test_awgn_power() {
        let mut rng = StdRng::seed_from_u64(7);
        let clean = vec![Complex64::new(1.0, 0.0); 20_000];
        let mut noisy = clean.clone();
        add_awgn(&mut noisy, 10.0, &mut rng);

        let noise_power = noisy
            .iter()
            .zip(clean.iter())
            .map(|(a, b)| (a - b).norm_sqr())
            .sum::<f64>()
            / clean.len() as f64;
        assert!((noise_power - 0.1).abs() < 0.01);
    }

    proptest::proptest! {
        #[test]
        fn prop_mixing_preserves_envelope(
            samples in proptest::collection::vec((-2.0f64..2.0, -2.0f64..2.0), 1..64),
            carrier in 0.0f64..1.0,
            start in 0.0f64..6.28,
        ) {
            let original: Vec<Complex64> = samples.iter().map(|&(re, im)| Complex64::new(re, im)).collect();
            let mut frame = original.clone();
            let mut phase = start;
            mix(&mut frame, carrier, &mut phase);

            for (a, b) in original.iter().zip(frame.iter()) {
                proptest::prop_assert!((a.norm() - b.norm()).abs() < 1e-9);
            }
            proptest::prop_assert!((0.0..2.0 * PI).contains(&phase));
        }
    }
}

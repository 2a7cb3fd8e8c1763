use classifier::ModType;
use num_complex::Complex64;
use signal_source::{SampleSource, SimulatedSource, SourceConfig};
use std::thread;
use std::time::{Duration, Instant};

fn capture(mod_type: ModType) -> Vec<Complex64> {
    let mut source = SimulatedSource::new(
        SourceConfig {
            frame_size: 512,
            buffer_capacity: 4096,
            snr_db: 30.0,
            seed: Some(3),
            realtime: false,
            ..SourceConfig::default()
        },
        mod_type,
    )
    .unwrap();
    source.start().unwrap();

    let buffer = source.buffer();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !buffer.read().is_full() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    source.stop();

    let samples = buffer.read().read_last(4096);
    samples
}

fn envelope_spread(samples: &[Complex64]) -> f64 {
    let mags: Vec<f64> = samples.iter().map(|s| s.norm()).collect();
    let mean = mags.iter().sum::<f64>() / mags.len() as f64;
    (mags.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / mags.len() as f64).sqrt() / mean
}

#[test]
fn amplitude_keying_has_wider_envelope_than_phase_keying() {
    let psk = capture(ModType::Psk2);
    let ask = capture(ModType::Ask2);
    assert_eq!(psk.len(), 4096);
    assert!(envelope_spread(&ask) > 3.0 * envelope_spread(&psk));
}

#[test]
fn unpaced_source_fills_quickly() {
    let start = Instant::now();
    let samples = capture(ModType::Mqam);
    assert_eq!(samples.len(), 4096);
    assert!(start.elapsed() < Duration::from_secs(5));
}

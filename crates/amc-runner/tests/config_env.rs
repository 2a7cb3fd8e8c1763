//! Environment overrides. Kept in its own test binary so the variables set
//! here do not leak into other tests.

use amc_runner::{load_config, RunMode};
use classifier::ModType;

#[test]
fn environment_overrides_file_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("amc.toml");
    std::fs::write(
        &path,
        r#"
mode = "CAPTURE_DATA"
run_seconds = 3

[capture]
label = "FM"
"#,
    )
    .unwrap();

    std::env::set_var("AMC_MODE", "CLASSIFY");
    std::env::set_var("AMC_EXTRACTOR__WINDOW_SIZE", "2048");
    std::env::set_var("AMC_SOURCE__SNR_DB", "7.5");

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.mode, RunMode::Classify);
    assert_eq!(config.run_seconds, 3);
    assert_eq!(config.extractor.window_size, 2048);
    assert_eq!(config.source.snr_db, 7.5);
    assert_eq!(config.capture.label, Some(ModType::Fm));

    // Environment alone
    let config = load_config(None).unwrap();
    assert_eq!(config.mode, RunMode::Classify);
    assert_eq!(config.run_seconds, 10);

    std::env::remove_var("AMC_MODE");
    std::env::remove_var("AMC_EXTRACTOR__WINDOW_SIZE");
    std::env::remove_var("AMC_SOURCE__SNR_DB");
}

//! AMC Pipeline - Main Entry Point

use amc_runner::{init_logging, load_config, Collaborators, MainRun, RunMode, RunOutcome};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    init_logging(&config.logging);

    info!("=== AMC Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    if config.mode == RunMode::Stopped {
        info!("Mode is STOPPED; set `mode` in the config file or AMC_MODE");
        return Ok(());
    }

    let collaborators = Collaborators::from_config(&config)?;
    let mut run = MainRun::from_config(&config);

    match run.start(config.mode, collaborators)? {
        RunOutcome::Running => {
            let deadline = Instant::now() + Duration::from_secs(config.run_seconds);
            while Instant::now() < deadline {
                thread::sleep(Duration::from_secs(1));
                match run.mod_type() {
                    Some(label) => info!("Smoothed label: {} ({} cycles)", label, run.cycles()),
                    None => info!("No label yet ({} cycles)", run.cycles()),
                }
            }
            run.stop();
        }
        RunOutcome::Trained(report) => {
            info!("Training report: {}", serde_json::to_string(&report)?);
        }
        RunOutcome::Tested(report) => {
            info!("Monte-Carlo report: {}", serde_json::to_string(&report)?);
        }
    }

    info!("Done");
    Ok(())
}

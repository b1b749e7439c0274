//! MargaNav daemon
//!
//! Brings up the configured device, localizes against the start corner and
//! drives the mission waypoints. Ctrl-C stops the motors and ends the run.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marga_io::create_device;
use marga_nav::{MargaConfig, MargaError, Orchestrator, Result};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `marga-nav <path>` (positional)
/// - `marga-nav --config <path>` (flag-based)
/// - `marga-nav -c <path>` (short flag)
///
/// Defaults to `marga.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "marga.toml".to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("MargaNav v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = MargaConfig::load(Path::new(&config_path))?;

    log::info!(
        "Device: {} ({})",
        config.device.name,
        config.device.device_type
    );
    log::info!(
        "Robot: wheel radius {:.2} cm, track {:.2} cm, grid {:.2} cm",
        config.robot.wheel_radius,
        config.robot.track,
        config.grid.spacing
    );

    let mut driver = create_device(&config.device)?;
    let handles = driver.initialize()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    let motors = Arc::clone(&handles.motors);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
        if let Err(e) = motors.stop() {
            log::warn!("Failed to stop motors: {}", e);
        }
    })
    .map_err(|e| MargaError::Thread(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut orchestrator = Orchestrator::new(config, handles, Arc::clone(&running));
    let result = orchestrator.run_mission();
    log::info!("Final phase: {}", orchestrator.phase());
    drop(orchestrator);

    if let Err(e) = driver.shutdown() {
        log::warn!("Device shutdown failed: {}", e);
    }

    match result {
        Err(MargaError::Interrupted) => {
            log::info!("MargaNav stopped by user");
            Ok(())
        }
        other => other,
    }
}

//! MCM Compressor - Folder compression front-end for the MCM archiver
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary crate provides the headless console shell. It initializes:
//! - Configuration loading ([`ConfigManager`])
//! - Logging infrastructure (daily file rotation, console output in debug mode)
//! - Tokio async runtime (subprocess supervision and output pumping)
//! - Console controller ([`ConsoleController`] - wires the terminal to the tracker)
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Blocks on the job and listens for Ctrl-C
//! - **Tokio workers**: Pump compressor output, run the tracker worker
//! - **Render thread**: Background std::thread printing progress events
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load `Compressor Config.yaml` from the config directory (written with defaults on first run)
//! 3. Initialize logging → logs/mcm-compressor.<date>
//! 4. Create tokio runtime with 2 worker threads
//! 5. Run one compression job through the ConsoleController
//! 6. Log the metrics summary
//! 7. Shutdown tokio runtime with 5s timeout
//!
//! # Exit Codes
//!
//! `0` when the archive was written, `130` when cancelled, `1` otherwise.

use anyhow::Result;
use clap::Parser;
use mcm_compressor::logging::{LOG_DIR, LOG_PREFIX, setup_logging_with_console};
use mcm_compressor::ui::{Cli, ConsoleController, exit_code};
use mcm_compressor::{APP_NAME, ConfigManager, Metrics, VERSION};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const WORKER_THREADS: usize = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let created_config = config_manager.ensure_config()?;
    let config = config_manager.load_config()?;
    let settings = config.settings;

    let debug_mode = cli.debug || settings.debug_mode;
    let _log_guard = setup_logging_with_console(LOG_DIR, LOG_PREFIX, debug_mode, debug_mode)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    if created_config {
        tracing::info!("Wrote default configuration to {}", config_manager.config_path());
    }
    tracing::info!(
        "Configuration from {}: tool={}, default profile={}",
        config_manager.config_path(),
        settings.tool_path,
        settings.default_profile
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(WORKER_THREADS)
        .thread_name("mcm-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", WORKER_THREADS);

    let metrics = Arc::new(Metrics::new());
    let result = ConsoleController::new(
        &cli,
        &settings,
        Arc::clone(&metrics),
        runtime.handle().clone(),
    )
    .and_then(|controller| controller.run(&cli.input_dir, cli.output.as_deref()));

    metrics.log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));

    match result {
        Ok(status) => {
            tracing::info!("Application shutdown complete ({:?})", status);
            Ok(ExitCode::from(exit_code(status)))
        }
        Err(e) => {
            tracing::error!("Compression run failed: {:#}", e);
            Err(e)
        }
    }
}

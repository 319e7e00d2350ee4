// MCM Compressor - Folder compression front-end for the MCM archiver
//
// This is the library crate containing process supervision, progress inference
// and the data structures around them. The binary crate (main.rs) provides the
// console entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod tracker;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{CompressionJob, CompressorConfig, CompressorSettings, JobStatus, TrackerState};
pub use state::StateManager;
pub use tracker::{JobHandle, ProgressEvent, ProgressTracker, ToolCommand, TrackerError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

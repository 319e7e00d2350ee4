// Data models for mcm-compressor
//
// This module contains all the data structures used throughout the application:
// - Configuration structures (serde-compatible with the YAML config file)
// - Job and tracker state structures

pub mod config;
pub mod job;

pub use config::{CompressorConfig, CompressorSettings};
pub use job::{CompressionJob, JobStatus, TrackerState};

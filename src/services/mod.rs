//! Services module - Process supervision and progress inference for folder compression.
//!
//! This module contains the building blocks the [`crate::tracker::ProgressTracker`]
//! orchestrates. None of them depend on the console shell, so they can be driven by
//! any front-end.
//!
//! # Components
//!
//! - [`size_probe`]: Measures a directory tree or a single file on disk
//! - [`units`]: Formats byte counts and computes the reduction achieved by a run
//! - [`ProgressParser`]: Scrapes `<int>KB -> <int>KB <int>KB/s` readings from output lines
//! - [`ProcessSupervisor`]: Launches the external compressor, merges its stdout and
//!   stderr into an [`OutputStream`], and terminates it on request
//! - [`ProgressIndicator`]: Best-effort taskbar progress integration
//!
//! # Usage Example
//!
//! ```ignore
//! use mcm_compressor::services::{ProcessSupervisor, ProgressParser};
//!
//! let supervisor = ProcessSupervisor::new();
//! let parser = ProgressParser::new();
//!
//! let mut stream = supervisor.start("mcm", ["-x11", "C:/Data/Photos", "C:/Data/Photos.mcm"])?;
//! while let Some(line) = stream.next_line().await {
//!     if let Some(sample) = parser.parse_line(&line) {
//!         println!("{} KB done at {} KB/s", sample.current_kb, sample.speed_kbps);
//!     }
//! }
//! let exit = supervisor.wait().await;
//! ```
//!
//! # MCM Integration
//!
//! The compressor is invoked as `<tool> <mode-flag> <input-directory> <output-file>`.
//! Its output format is unstructured, so progress parsing is best effort: lines that
//! do not match are echoed as diagnostics. The existence of a non-empty output file
//! is the only success signal.

pub mod indicator;
pub mod progress_parser;
pub mod size_probe;
pub mod supervisor;
pub mod units;

pub use indicator::{NoopIndicator, ProgressIndicator, TerminalProgressIndicator};
pub use progress_parser::{ProgressParser, ProgressSample};
pub use size_probe::{SizeProbeError, file_size, total_size};
pub use supervisor::{LineSplitter, OutputStream, ProcessExit, ProcessSupervisor, SupervisorError};
pub use units::{ReductionSummary, format_bytes, reduction_summary};

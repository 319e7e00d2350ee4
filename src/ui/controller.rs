// Console controller - Bridges the terminal with the progress tracker
//
// This module contains the ConsoleController which coordinates between:
// - The command line (input folder, output path, profile)
// - ProgressTracker (process supervision and progress inference)
// - A render thread that prints ProgressEvents as they arrive
//
// It handles:
// - Validating the input folder and deriving the archive path
// - Ctrl-C → cancellation of the running compressor
// - Rendering progress, completion and failure messages

use crate::metrics::Metrics;
use crate::models::{CompressorSettings, JobStatus};
use crate::services::{NoopIndicator, ProgressIndicator, TerminalProgressIndicator};
use crate::tracker::{OUTPUT_MISSING_REASON, ProgressEvent, ProgressTracker, ToolCommand};
use crate::ui::cli::Cli;
use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Message shown when a job ends without an archive
pub const FAILURE_MESSAGE: &str = "Error: Compression failed or output file not found.";

/// Process exit code reported for a job that was cancelled with Ctrl-C
pub const EXIT_CANCELLED: u8 = 130;

/// Archive path next to the input folder: `<parent>/<folder-name>.<extension>`
pub fn derive_output_path(input_dir: &Utf8Path, extension: &str) -> Result<Utf8PathBuf> {
    let name = input_dir
        .file_name()
        .ok_or_else(|| anyhow!("Cannot derive an archive name from {}", input_dir))?;

    let file_name = format!("{}.{}", name, extension);
    Ok(match input_dir.parent() {
        Some(parent) => parent.join(file_name),
        None => Utf8PathBuf::from(file_name),
    })
}

/// Check that the input is an existing folder
pub fn validate_input(input_dir: &Utf8Path) -> Result<()> {
    if input_dir.is_file() {
        bail!("Please select a folder, not a file: {}", input_dir);
    }
    if !input_dir.is_dir() {
        bail!("Input folder does not exist: {}", input_dir);
    }
    Ok(())
}

/// Remaining time in seconds below one minute, in minutes otherwise
pub fn format_eta(eta_seconds: f64) -> String {
    if eta_seconds < 60.0 {
        format!("{:.2} seconds", eta_seconds)
    } else {
        format!("{:.2} minutes", eta_seconds / 60.0)
    }
}

/// Text printed for one event. Every event renders to at least one line.
pub fn render_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::LineOutput(line) => line.clone(),
        ProgressEvent::ProgressUpdate {
            percent,
            eta_seconds,
        } => format!(
            "[{:>3}%] Time remaining: {}",
            percent,
            format_eta(*eta_seconds)
        ),
        ProgressEvent::Completed {
            elapsed, summary, ..
        } if summary.is_degenerate() => format!(
            "Done in {:.2} seconds\n{}",
            elapsed.as_secs_f64(),
            summary.percent
        ),
        ProgressEvent::Completed {
            elapsed, summary, ..
        } => format!(
            "Done in {:.2} seconds\nReduction: {} | Saved: {}",
            elapsed.as_secs_f64(),
            summary.percent,
            summary.saved
        ),
        ProgressEvent::Failed(reason) if reason == OUTPUT_MISSING_REASON => {
            FAILURE_MESSAGE.to_string()
        }
        ProgressEvent::Failed(reason) => format!("Error: {}", reason),
        ProgressEvent::Cancelled { elapsed } => format!(
            "Compression cancelled after {:.2} seconds",
            elapsed.as_secs_f64()
        ),
    }
}

/// Process exit code for a finished job
pub fn exit_code(status: JobStatus) -> u8 {
    match status {
        JobStatus::Completed => 0,
        JobStatus::Cancelled => EXIT_CANCELLED,
        _ => 1,
    }
}

/// Console controller that wires the command line to the progress tracker
///
/// This is the presentation shell for headless use. It:
/// - Resolves the compressor and mode flag from configuration and arguments
/// - Starts one compression job and waits for it on the tokio runtime
/// - Renders events on a dedicated thread so slow terminals never stall the worker
/// - Turns Ctrl-C into a cancellation request
///
/// # Example
/// ```ignore
/// let cli = Cli::parse();
/// let config = ConfigManager::new(&cli.config_dir)?.load_config()?;
/// let runtime = tokio::runtime::Runtime::new()?;
///
/// let handle = runtime.handle().clone();
/// let controller = ConsoleController::new(&cli, &config.settings, metrics, handle)?;
/// let status = controller.run(&cli.input_dir, cli.output.as_deref())?;
/// ```
pub struct ConsoleController {
    /// Tracker owning the compressor process
    tracker: ProgressTracker,

    /// Receiving end of the tracker's events, handed to the render thread
    events_rx: mpsc::Receiver<ProgressEvent>,

    /// Extension for derived archive paths
    output_extension: String,

    /// Handle to the tokio runtime the job runs on
    runtime: tokio::runtime::Handle,
}

impl ConsoleController {
    /// Create a controller for one compression run.
    ///
    /// Fails if the requested profile is not configured.
    pub fn new(
        cli: &Cli,
        settings: &CompressorSettings,
        metrics: Arc<Metrics>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        let tool = resolve_tool(cli, settings)?;
        tracing::info!("Using {} with mode flag {}", tool.program, tool.mode_flag);

        let indicator: Arc<dyn ProgressIndicator> = if settings.taskbar_progress && !cli.no_taskbar
        {
            Arc::new(TerminalProgressIndicator::stderr())
        } else {
            Arc::new(NoopIndicator)
        };

        let (events_tx, events_rx) = mpsc::channel(settings.event_buffer.max(1));
        let tracker = ProgressTracker::new(tool, events_tx)
            .with_indicator(indicator)
            .with_metrics(metrics);

        tracing::info!("Console controller initialized");

        Ok(Self {
            tracker,
            events_rx,
            output_extension: settings.output_extension.clone(),
            runtime,
        })
    }

    /// Compress `input_dir` and block until the job ends.
    ///
    /// The archive goes to `output` if given, otherwise next to the input folder.
    pub fn run(self, input_dir: &Utf8Path, output: Option<&Utf8Path>) -> Result<JobStatus> {
        validate_input(input_dir)?;

        let output_path = match output {
            Some(path) => path.to_path_buf(),
            None => derive_output_path(input_dir, &self.output_extension)?,
        };

        println!("Compressing {} -> {}", input_dir, output_path);

        let Self {
            tracker,
            events_rx,
            runtime,
            ..
        } = self;

        let renderer = spawn_renderer(events_rx);

        let outcome = runtime.block_on(Self::run_job(
            &tracker,
            input_dir.to_path_buf(),
            output_path,
        ));

        // Closing the channel lets the render thread finish even if no terminal event was sent
        drop(tracker);
        if renderer.join().is_err() {
            tracing::error!("Render thread panicked");
        }

        outcome
    }

    async fn run_job(
        tracker: &ProgressTracker,
        input_dir: Utf8PathBuf,
        output_path: Utf8PathBuf,
    ) -> Result<JobStatus> {
        let handle = tracker
            .start(input_dir, output_path)
            .await
            .context("Compression could not start")?;

        let finished = handle.wait();
        tokio::pin!(finished);

        loop {
            tokio::select! {
                status = &mut finished => return Ok(status?),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::warn!("Interrupt received, stopping compression");
                            if !tracker.cancel() {
                                tracing::debug!("Compressor already exited");
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to listen for Ctrl-C: {}", e);
                            return Ok((&mut finished).await?);
                        }
                    }
                }
            }
        }
    }
}

/// Compressor program and mode flag for this run
fn resolve_tool(cli: &Cli, settings: &CompressorSettings) -> Result<ToolCommand> {
    let mode_flag = settings.mode_flag(cli.profile.as_deref()).ok_or_else(|| {
        anyhow!(
            "Unknown profile '{}' (available: {})",
            cli.profile.as_deref().unwrap_or(&settings.default_profile),
            settings.profile_names().join(", ")
        )
    })?;

    let program = cli.tool.clone().unwrap_or_else(|| settings.tool_path.clone());
    Ok(ToolCommand::new(program, mode_flag))
}

/// Print events on a dedicated thread until the job ends or the channel closes
fn spawn_renderer(mut events_rx: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        tracing::debug!("Render thread started");

        let stdout = std::io::stdout();
        while let Some(event) = events_rx.blocking_recv() {
            let terminal = event.is_terminal();

            let mut out = stdout.lock();
            if let Err(e) = writeln!(out, "{}", render_event(&event)).and_then(|_| out.flush()) {
                tracing::warn!("Failed to write to stdout: {}", e);
            }
            drop(out);

            if terminal {
                break;
            }
        }

        tracing::debug!("Render thread stopped");
    })
}

// Progress tracking for one compression job at a time
//
// The tracker claims the job slot, measures the input, launches the compressor
// through the ProcessSupervisor and hands the output stream to a worker task.
// The worker turns output lines into ProgressEvents and decides how the job ended
// once the stream closes.

pub mod events;

pub use events::{ProgressEstimate, ProgressEvent};

use crate::metrics::Metrics;
use crate::models::{CompressionJob, JobStatus, TrackerState};
use crate::services::{
    NoopIndicator, OutputStream, ProcessSupervisor, ProgressIndicator, ProgressParser,
    SizeProbeError, SupervisorError, file_size, reduction_summary, total_size,
};
use crate::state::StateManager;
use anyhow::Result as AnyResult;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Reason reported when the compressor left no usable archive behind
pub const OUTPUT_MISSING_REASON: &str = "output file not found";

/// Errors returned by [`ProgressTracker::start`]
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("A compression job is already running")]
    JobAlreadyRunning,

    #[error(transparent)]
    SizeProbe(#[from] SizeProbeError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Tracker worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// The compressor executable and the mode flag passed ahead of the paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub mode_flag: String,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, mode_flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            mode_flag: mode_flag.into(),
        }
    }

    /// Arguments for one run: `<mode-flag> <input-directory> <output-file>`
    pub fn args<'a>(
        &'a self,
        input_dir: &'a Utf8Path,
        output_path: &'a Utf8Path,
    ) -> [&'a str; 3] {
        [
            self.mode_flag.as_str(),
            input_dir.as_str(),
            output_path.as_str(),
        ]
    }
}

/// Handle to the background worker of a started job
#[derive(Debug)]
pub struct JobHandle {
    task: JoinHandle<JobStatus>,
}

impl JobHandle {
    /// Wait for the worker to finish and return the job's terminal status
    pub async fn wait(self) -> Result<JobStatus, TrackerError> {
        Ok(self.task.await?)
    }
}

/// Orchestrates one compression run from launch to completion report.
///
/// The tracker is cheap to clone; clones share the job slot, the supervisor and
/// the event channel. It enforces the single-flight rule through
/// [`StateManager::try_begin`], so a second `start` while a job runs is rejected
/// instead of queued.
///
/// # Example
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::channel(256);
/// let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);
///
/// let handle = tracker.start("C:/Data/Photos".into(), "C:/Data/Photos.mcm".into()).await?;
/// while let Some(event) = rx.recv().await {
///     if event.is_terminal() {
///         break;
///     }
/// }
/// handle.wait().await?;
/// ```
#[derive(Clone)]
pub struct ProgressTracker {
    tool: Arc<ToolCommand>,
    supervisor: Arc<ProcessSupervisor>,
    parser: Arc<ProgressParser>,
    state: StateManager,
    events: mpsc::Sender<ProgressEvent>,
    indicator: Arc<dyn ProgressIndicator>,
    metrics: Arc<Metrics>,
}

impl ProgressTracker {
    /// Create an idle tracker that reports through `events`
    pub fn new(tool: ToolCommand, events: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tool: Arc::new(tool),
            supervisor: Arc::new(ProcessSupervisor::new()),
            parser: Arc::new(ProgressParser::new()),
            state: StateManager::new(),
            events,
            indicator: Arc::new(NoopIndicator),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Mirror progress to an OS-level indicator
    pub fn with_indicator(mut self, indicator: Arc<dyn ProgressIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    /// Record counters into shared metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn tool(&self) -> &ToolCommand {
        &self.tool
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn snapshot(&self) -> TrackerState {
        self.state.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Start compressing `input_dir` into `output_path`.
    ///
    /// Returns as soon as the compressor is running; progress and the outcome
    /// arrive as events. Failures to measure the input or launch the tool are
    /// reported both as a `Failed` event and as the returned error.
    pub async fn start(
        &self,
        input_dir: Utf8PathBuf,
        output_path: Utf8PathBuf,
    ) -> Result<JobHandle, TrackerError> {
        let total_kb = self.prepare(&input_dir).await?;

        let stream = match self
            .supervisor
            .start(&self.tool.program, self.tool.args(&input_dir, &output_path))
        {
            Ok(stream) => stream,
            Err(e) => {
                self.abort(e.to_string()).await;
                return Err(e.into());
            }
        };

        let job = CompressionJob::new(input_dir, output_path, total_kb);
        self.state.attach_job(job.clone());

        tracing::info!(
            "Compressing {} -> {} ({} KB expected, pid {:?})",
            job.input_dir,
            job.output_path,
            job.expected_total_kb,
            self.supervisor.pid()
        );

        let tracker = self.clone();
        let task = tokio::spawn(async move { tracker.track(job, stream).await });

        Ok(JobHandle { task })
    }

    /// Run a job against an output stream that was produced elsewhere.
    ///
    /// Claims the job slot and measures the input exactly like [`start`](Self::start),
    /// then processes `stream` on the current task instead of launching the tool.
    /// Useful for replaying captured compressor output.
    pub async fn track_output(
        &self,
        input_dir: Utf8PathBuf,
        output_path: Utf8PathBuf,
        stream: OutputStream,
    ) -> Result<JobStatus, TrackerError> {
        let total_kb = self.prepare(&input_dir).await?;

        let job = CompressionJob::new(input_dir, output_path, total_kb);
        self.state.attach_job(job.clone());

        Ok(self.track(job, stream).await)
    }

    /// Request termination of the running compressor.
    ///
    /// Returns `false` when nothing is running. The outcome is reported by the
    /// worker as a `Cancelled` event once the process is gone.
    pub fn cancel(&self) -> bool {
        self.supervisor.cancel()
    }

    /// Claim the job slot and measure the input in KiB
    async fn prepare(&self, input_dir: &Utf8Path) -> Result<u64, TrackerError> {
        if let Err(status) = self.state.try_begin() {
            tracing::warn!("Rejected new job: tracker is {:?}", status);
            return Err(TrackerError::JobAlreadyRunning);
        }

        let dir = input_dir.to_owned();
        let measured = match tokio::task::spawn_blocking(move || total_size(&dir)).await {
            Ok(measured) => measured,
            Err(e) => {
                self.abort(e.to_string()).await;
                return Err(e.into());
            }
        };

        match measured {
            Ok(bytes) => Ok(bytes / 1024),
            Err(e) => {
                self.abort(e.to_string()).await;
                Err(e.into())
            }
        }
    }

    /// Fail a job that never got a running process
    async fn abort(&self, reason: String) {
        tracing::error!("Compression could not start: {}", reason);
        self.metrics.record_job_failed();
        self.state.finish(JobStatus::Failed, Some(reason.clone()));
        self.emit(ProgressEvent::Failed(reason)).await;
    }

    /// Drain the output stream, then settle the job's outcome
    async fn track(&self, job: CompressionJob, mut stream: OutputStream) -> JobStatus {
        if !job.has_estimate() {
            tracing::warn!(
                "{} measures under 1 KB, progress will not be estimated",
                job.input_dir
            );
        }

        while let Some(line) = stream.next_line().await {
            self.handle_line(&job, line).await;
        }

        let exit = self.supervisor.wait().await;
        if let Some(exit) = exit {
            tracing::debug!("Compressor exit code {}", exit.code());
        }

        let elapsed = job.elapsed();
        self.metrics.record_run_time(elapsed);

        let status = if exit.is_some_and(|e| e.cancelled) {
            self.report_cancelled(elapsed).await
        } else {
            self.report_outcome(&job, elapsed).await
        };

        tracing::info!(
            "Job for {} finished as {:?} after {:.2}s",
            job.input_dir,
            status,
            elapsed.as_secs_f64()
        );
        status
    }

    async fn handle_line(&self, job: &CompressionJob, line: String) {
        let sample = self.parser.parse_line(&line);
        self.metrics.record_line(sample.is_some());
        self.state.record_line();
        self.emit(ProgressEvent::LineOutput(line)).await;

        let Some(sample) = sample else {
            return;
        };

        let Some(estimate) = ProgressEstimate::from_reading(
            job.expected_total_kb,
            sample.current_kb,
            sample.speed_kbps,
        ) else {
            tracing::trace!("No estimate for reading {:?}", sample);
            return;
        };

        self.state
            .record_progress(estimate.percent, estimate.eta_seconds, sample.current_kb);
        self.metrics.record_progress_update();
        self.emit(estimate.into()).await;
        self.update_indicator(|indicator| indicator.set_progress(estimate.percent));
    }

    async fn report_cancelled(&self, elapsed: Duration) -> JobStatus {
        tracing::warn!("Compression cancelled after {:.2}s", elapsed.as_secs_f64());
        self.metrics.record_job_cancelled();
        self.update_indicator(|indicator| indicator.clear());
        self.state.finish(JobStatus::Cancelled, None);
        self.emit(ProgressEvent::Cancelled { elapsed }).await;
        JobStatus::Cancelled
    }

    async fn report_outcome(&self, job: &CompressionJob, elapsed: Duration) -> JobStatus {
        let compressed_size = match file_size(&job.output_path) {
            Ok(size) if size > 0 => size,
            Ok(_) => {
                tracing::error!("Compressor produced an empty archive at {}", job.output_path);
                return self.report_failed(OUTPUT_MISSING_REASON.to_string()).await;
            }
            Err(e) => {
                tracing::error!("{}", e);
                return self.report_failed(OUTPUT_MISSING_REASON.to_string()).await;
            }
        };

        let input_dir = job.input_dir.clone();
        let original_size = match tokio::task::spawn_blocking(move || total_size(&input_dir)).await
        {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => return self.report_failed(e.to_string()).await,
            Err(e) => return self.report_failed(e.to_string()).await,
        };

        let summary = reduction_summary(original_size, compressed_size);
        tracing::info!(
            "Reduction: {} | Saved: {} ({} -> {} bytes)",
            summary.percent,
            summary.saved,
            original_size,
            compressed_size
        );

        self.metrics.record_job_completed();
        self.state.record_progress(100, 0.0, original_size / 1024);
        self.state.finish(JobStatus::Completed, None);
        self.emit(ProgressEstimate::finished().into()).await;
        self.update_indicator(|indicator| indicator.set_done());
        self.emit(ProgressEvent::Completed {
            elapsed,
            original_size,
            compressed_size,
            summary,
        })
        .await;

        JobStatus::Completed
    }

    async fn report_failed(&self, reason: String) -> JobStatus {
        tracing::error!("Compression failed: {}", reason);
        self.metrics.record_job_failed();
        self.update_indicator(|indicator| indicator.clear());
        self.state.finish(JobStatus::Failed, Some(reason.clone()));
        self.emit(ProgressEvent::Failed(reason)).await;
        JobStatus::Failed
    }

    async fn emit(&self, event: ProgressEvent) {
        if self.events.send(event).await.is_err() {
            self.metrics.record_event_send_error();
            tracing::debug!("Event receiver dropped, event discarded");
        }
    }

    fn update_indicator<F>(&self, update: F)
    where
        F: FnOnce(&dyn ProgressIndicator) -> AnyResult<()>,
    {
        if let Err(e) = update(self.indicator.as_ref()) {
            self.metrics.record_indicator_error();
            tracing::warn!("Progress indicator update failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::indicator::MockProgressIndicator;
    use mockall::predicate::eq;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path.to_path_buf()).unwrap()
    }

    /// Input folder holding `bytes` bytes, plus the archive path next to it
    fn fixture(bytes: usize) -> (TempDir, Utf8PathBuf, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let input = utf8(&temp.path().join("photos"));
        fs::create_dir(&input).unwrap();
        fs::write(input.join("data.bin"), vec![0u8; bytes]).unwrap();
        let output = utf8(&temp.path().join("photos.mcm"));
        (temp, input, output)
    }

    fn drain(rx: &mut mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_tool_args() {
        let tool = ToolCommand::new("mcm", "-x11");
        let input = Utf8PathBuf::from("C:/My Data/Photos");
        let output = Utf8PathBuf::from("C:/My Data/Photos.mcm");

        assert_eq!(
            tool.args(&input, &output),
            ["-x11", "C:/My Data/Photos", "C:/My Data/Photos.mcm"]
        );
    }

    #[tokio::test]
    async fn test_progress_then_completion() {
        let (_temp, input, output) = fixture(2_048_000);
        fs::write(&output, vec![1u8; 1_024_000]).unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);

        let stream = OutputStream::from_lines([
            "MCM compressor",
            "0KB -> 500KB 250KB/s",
            "0KB -> 1000KB 250KB/s",
        ]);
        let status = tracker.track_output(input, output, stream).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 7);
        assert_eq!(events[0], ProgressEvent::LineOutput("MCM compressor".into()));
        assert_eq!(
            events[2],
            ProgressEvent::ProgressUpdate {
                percent: 25,
                eta_seconds: 6.0
            }
        );
        assert_eq!(
            events[4],
            ProgressEvent::ProgressUpdate {
                percent: 50,
                eta_seconds: 4.0
            }
        );
        assert_eq!(
            events[5],
            ProgressEvent::ProgressUpdate {
                percent: 100,
                eta_seconds: 0.0
            }
        );
        match &events[6] {
            ProgressEvent::Completed {
                original_size,
                compressed_size,
                summary,
                ..
            } => {
                assert_eq!(*original_size, 2_048_000);
                assert_eq!(*compressed_size, 1_024_000);
                assert_eq!(summary.percent, "50.00%");
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        assert_eq!(tracker.status(), JobStatus::Completed);
        assert!(tracker.snapshot().job.is_none());
    }

    #[tokio::test]
    async fn test_missing_output_fails() {
        let (_temp, input, output) = fixture(4096);

        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);

        let stream = OutputStream::from_lines(["error: disk full"]);
        let status = tracker.track_output(input, output, stream).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ProgressEvent::LineOutput("error: disk full".into()),
                ProgressEvent::Failed(OUTPUT_MISSING_REASON.into()),
            ]
        );
        assert_eq!(
            tracker.snapshot().last_error.as_deref(),
            Some(OUTPUT_MISSING_REASON)
        );
    }

    #[tokio::test]
    async fn test_empty_output_fails() {
        let (_temp, input, output) = fixture(4096);
        fs::write(&output, b"").unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);

        let status = tracker
            .track_output(input, output, OutputStream::from_lines(Vec::<String>::new()))
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(
            drain(&mut rx),
            vec![ProgressEvent::Failed(OUTPUT_MISSING_REASON.into())]
        );
    }

    #[tokio::test]
    async fn test_zero_speed_and_empty_input_emit_no_updates() {
        // Input smaller than 1 KiB: no estimate is possible
        let (_temp, input, output) = fixture(100);
        fs::write(&output, vec![1u8; 50]).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);

        let stream = OutputStream::from_lines(["0KB -> 0KB 0KB/s", "0KB -> 1KB 10KB/s"]);
        let status = tracker.track_output(input, output, stream).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ProgressEvent::ProgressUpdate { .. }))
            .collect();
        assert_eq!(
            updates,
            vec![ProgressEvent::ProgressUpdate {
                percent: 100,
                eta_seconds: 0.0
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_input_reports_failure() {
        let temp = TempDir::new().unwrap();
        let input = utf8(&temp.path().join("missing"));
        let output = utf8(&temp.path().join("missing.mcm"));

        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);

        let result = tracker.start(input, output).await;
        assert!(matches!(result, Err(TrackerError::SizeProbe(_))));
        assert_eq!(tracker.status(), JobStatus::Failed);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Failed(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_failure() {
        let (_temp, input, output) = fixture(2048);

        let (tx, mut rx) = mpsc::channel(16);
        let metrics = Arc::new(Metrics::new());
        let tracker = ProgressTracker::new(
            ToolCommand::new("definitely-not-a-real-compressor-binary", "-x11"),
            tx,
        )
        .with_metrics(Arc::clone(&metrics));

        let result = tracker.start(input, output).await;
        assert!(matches!(
            result,
            Err(TrackerError::Supervisor(SupervisorError::Spawn { .. }))
        ));
        assert!(matches!(drain(&mut rx)[..], [ProgressEvent::Failed(_)]));
        assert_eq!(metrics.jobs_failed.load(Ordering::Relaxed), 1);
        assert!(!tracker.cancel());
    }

    #[tokio::test]
    async fn test_rejects_start_while_running() {
        let (_temp, input, output) = fixture(2048);

        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx);
        tracker.state.try_begin().unwrap();

        let result = tracker.start(input, output).await;
        assert!(matches!(result, Err(TrackerError::JobAlreadyRunning)));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(tracker.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_indicator_follows_progress() {
        let (_temp, input, output) = fixture(2_048_000);
        fs::write(&output, vec![1u8; 10]).unwrap();

        let mut indicator = MockProgressIndicator::new();
        indicator
            .expect_set_progress()
            .with(eq(25))
            .times(1)
            .returning(|_| Ok(()));
        indicator
            .expect_set_progress()
            .with(eq(50))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("terminal closed")));
        indicator.expect_set_done().times(1).returning(|| Ok(()));
        indicator.expect_clear().never();

        let (tx, _rx) = mpsc::channel(16);
        let metrics = Arc::new(Metrics::new());
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx)
            .with_indicator(Arc::new(indicator))
            .with_metrics(Arc::clone(&metrics));

        let stream = OutputStream::from_lines(["0KB -> 500KB 250KB/s", "0KB -> 1000KB 250KB/s"]);
        let status = tracker.track_output(input, output, stream).await.unwrap();

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(metrics.indicator_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.progress_updates.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.samples_parsed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_stop_job() {
        let (_temp, input, output) = fixture(2048);
        fs::write(&output, vec![1u8; 10]).unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let metrics = Arc::new(Metrics::new());
        let tracker = ProgressTracker::new(ToolCommand::new("mcm", "-x11"), tx)
            .with_metrics(Arc::clone(&metrics));

        let status = tracker
            .track_output(input, output, OutputStream::from_lines(["hello"]))
            .await
            .unwrap();

        assert_eq!(status, JobStatus::Completed);
        // LineOutput, ProgressUpdate(100) and Completed all went nowhere
        assert_eq!(metrics.event_send_errors.load(Ordering::Relaxed), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_running_tool() {
        let (temp, input, output) = fixture(2048);
        let script = utf8(&temp.path().join("stall.sh"));
        fs::write(&script, "echo started\nexec sleep 30\n").unwrap();

        // `sh <script> <input> <output>`: the script takes the mode flag's place
        let (tx, mut rx) = mpsc::channel(16);
        let tracker = ProgressTracker::new(ToolCommand::new("sh", script.as_str()), tx);

        let handle = tracker.start(input, output).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::LineOutput("started".into()))
        );
        assert!(tracker.is_running());
        assert!(tracker.cancel());

        let status = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .expect("job did not stop after cancellation")
            .unwrap();
        assert_eq!(status, JobStatus::Cancelled);
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Cancelled { .. })));
        assert!(!tracker.is_running());
        assert!(!tracker.cancel());
    }
}

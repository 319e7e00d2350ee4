use camino::Utf8PathBuf;
use std::time::{Duration, Instant};

/// One run of the external compressor against one input directory.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionJob {
    pub input_dir: Utf8PathBuf,
    pub output_path: Utf8PathBuf,

    /// Input size in KiB, measured before the process starts
    pub expected_total_kb: u64,

    pub started_at: Instant,
}

impl CompressionJob {
    pub fn new(input_dir: Utf8PathBuf, output_path: Utf8PathBuf, expected_total_kb: u64) -> Self {
        Self {
            input_dir,
            output_path,
            expected_total_kb,
            started_at: Instant::now(),
        }
    }

    /// Whether percent and ETA can be derived for this job
    pub fn has_estimate(&self) -> bool {
        self.expected_total_kb > 0
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Lifecycle of the tracker's job slot.
///
/// `Idle → Running → {Completed, Failed, Cancelled}`. Terminal states go back to
/// `Running` on the next start; there is no explicit reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_running(self) -> bool {
        self == JobStatus::Running
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Everything the control surface may read about the current job.
///
/// Wrapped in `Arc<RwLock<_>>` by [`crate::state::StateManager`]; only the
/// tracker's worker mutates it while a job runs.
#[derive(Clone, Debug, Default)]
pub struct TrackerState {
    pub status: JobStatus,

    /// Present from the moment the process is spawned until the job ends
    pub job: Option<CompressionJob>,

    // Last progress derived from the output stream
    pub last_percent: Option<u8>,
    pub last_eta_seconds: Option<f64>,
    pub last_processed_kb: Option<u64>,

    pub lines_seen: usize,

    /// Reason given for the most recent failure
    pub last_error: Option<String>,
}

impl TrackerState {
    /// Clear per-job progress before a new run
    pub fn reset_progress(&mut self) {
        self.last_percent = None;
        self.last_eta_seconds = None;
        self.last_processed_kb = None;
        self.lines_seen = 0;
        self.last_error = None;
    }
}

// Performance metrics module
//
// Provides lightweight counters for monitoring compression runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters for compression jobs
///
/// Uses atomic operations for thread-safe tracking without locks. The tracker
/// updates them from its worker task; the shell logs a summary on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Number of jobs that produced an archive
    pub jobs_completed: AtomicUsize,

    /// Number of jobs that ended without an archive
    pub jobs_failed: AtomicUsize,

    /// Number of jobs stopped on request
    pub jobs_cancelled: AtomicUsize,

    /// Total wall-clock time of finished jobs in milliseconds
    pub total_run_time_ms: AtomicU64,

    /// Output lines read from the compressor
    pub lines_read: AtomicU64,

    /// Lines that carried a progress reading
    pub samples_parsed: AtomicU64,

    /// Lines without a progress reading
    pub parse_misses: AtomicU64,

    /// Progress updates emitted to the shell
    pub progress_updates: AtomicU64,

    /// Events that could not be delivered (receiver gone)
    pub event_send_errors: AtomicU64,

    /// Failed taskbar indicator updates
    pub indicator_errors: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            jobs_completed: AtomicUsize::new(0),
            jobs_failed: AtomicUsize::new(0),
            jobs_cancelled: AtomicUsize::new(0),
            total_run_time_ms: AtomicU64::new(0),
            lines_read: AtomicU64::new(0),
            samples_parsed: AtomicU64::new(0),
            parse_misses: AtomicU64::new(0),
            progress_updates: AtomicU64::new(0),
            event_send_errors: AtomicU64::new(0),
            indicator_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall-clock time of a finished job
    pub fn record_run_time(&self, duration: Duration) {
        self.total_run_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record one output line and whether it carried a progress reading
    pub fn record_line(&self, parsed: bool) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
        if parsed {
            self.samples_parsed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.parse_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_progress_update(&self) {
        self.progress_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_send_error(&self) {
        self.event_send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indicator_error(&self) {
        self.indicator_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average run time of completed jobs in milliseconds
    pub fn avg_run_time_ms(&self) -> f64 {
        let total = self.total_run_time_ms.load(Ordering::Relaxed);
        let count = self.jobs_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Compression Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Jobs: {} completed, {} failed, {} cancelled",
            self.jobs_completed.load(Ordering::Relaxed),
            self.jobs_failed.load(Ordering::Relaxed),
            self.jobs_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total run time: {:.2}s (avg: {:.2}ms per completed job)",
            self.total_run_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_run_time_ms()
        );
        tracing::info!(
            "Output lines: {}, progress samples: {}, unparsed: {}, updates emitted: {}",
            self.lines_read.load(Ordering::Relaxed),
            self.samples_parsed.load(Ordering::Relaxed),
            self.parse_misses.load(Ordering::Relaxed),
            self.progress_updates.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Undelivered events: {}, indicator errors: {}",
            self.event_send_errors.load(Ordering::Relaxed),
            self.indicator_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

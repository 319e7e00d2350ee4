// State management module
//
// This module provides the StateManager which wraps TrackerState with thread-safe
// access using Arc<RwLock<T>>. The tracker's worker is the only writer while a job
// runs; the control surface reads snapshots.

use crate::models::{CompressionJob, JobStatus, TrackerState};
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe holder of the tracker's job slot
///
/// This is the single-owner resource behind the single-flight rule:
/// - [`try_begin()`](Self::try_begin) checks for an active job and claims the slot
///   under one write lock, so two starts can never both succeed
/// - [`read()`](Self::read) and [`snapshot()`](Self::snapshot) give the control
///   surface a consistent view without blocking the worker for long
///
/// # Related Types
///
/// - [`crate::models::TrackerState`]: The underlying state structure
/// - [`crate::tracker::ProgressTracker`]: The only writer during a job
pub struct StateManager {
    state: Arc<RwLock<TrackerState>>,
}

impl StateManager {
    /// Create a new StateManager in the `Idle` state
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> TrackerState {
        self.read(TrackerState::clone)
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.status.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TrackerState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Execute a function with write access to the state
    pub fn update<F, R>(&self, update_fn: F) -> R
    where
        F: FnOnce(&mut TrackerState) -> R,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update_fn(&mut state)
    }

    pub fn status(&self) -> JobStatus {
        self.read(|s| s.status)
    }

    // Convenience methods for the job lifecycle

    /// Claim the job slot for a new run.
    ///
    /// Fails with the current status if a job is already running. On success the
    /// state is `Running` with progress cleared; the job itself is attached once
    /// the process has been spawned.
    pub fn try_begin(&self) -> Result<(), JobStatus> {
        self.update(|state| {
            if state.status.is_running() {
                return Err(state.status);
            }

            state.status = JobStatus::Running;
            state.job = None;
            state.reset_progress();
            Ok(())
        })
    }

    /// Attach the job once its process is running
    pub fn attach_job(&self, job: CompressionJob) {
        self.update(|state| {
            state.job = Some(job);
        });
    }

    /// Count one line of process output
    pub fn record_line(&self) {
        self.update(|state| {
            state.lines_seen += 1;
        });
    }

    /// Store the most recent progress estimate
    pub fn record_progress(&self, percent: u8, eta_seconds: f64, processed_kb: u64) {
        self.update(|state| {
            state.last_percent = Some(percent);
            state.last_eta_seconds = Some(eta_seconds);
            state.last_processed_kb = Some(processed_kb);
        });
    }

    /// End the current job in a terminal status and release the slot
    pub fn finish(&self, status: JobStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());

        self.update(|state| {
            state.status = status;
            state.job = None;
            state.last_error = error;
        });

        tracing::debug!("Job slot released with status {:?}", status);
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

use crate::services::ReductionSummary;
use std::time::Duration;

/// Notifications sent from the tracker's worker to the presentation shell.
///
/// Events arrive in the order the compressor produced the underlying output.
/// Every job that gets past `start` ends with exactly one terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// One line of compressor output, verbatim
    LineOutput(String),

    /// Progress derived from the most recent reading
    ProgressUpdate {
        /// 0..=100
        percent: u8,
        eta_seconds: f64,
    },

    /// The archive was written
    Completed {
        elapsed: Duration,
        original_size: u64,
        compressed_size: u64,
        summary: ReductionSummary,
    },

    /// The job ended without an archive
    Failed(String),

    /// The job was stopped on request
    Cancelled { elapsed: Duration },
}

impl ProgressEvent {
    /// Whether no further events follow for this job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. }
                | ProgressEvent::Failed(_)
                | ProgressEvent::Cancelled { .. }
        )
    }
}

/// Percent complete and time remaining for one progress reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    pub percent: u8,
    pub eta_seconds: f64,
}

impl ProgressEstimate {
    /// Derive an estimate from the processed amount and current throughput.
    ///
    /// Returns `None` when there is nothing to estimate against (empty input)
    /// or the tool reports zero throughput; the previous estimate stands in
    /// that case. Readings past the expected total clamp to 100% and 0 seconds.
    pub fn from_reading(total_kb: u64, current_kb: u64, speed_kbps: u64) -> Option<Self> {
        if total_kb == 0 || speed_kbps == 0 {
            return None;
        }

        let remaining_kb = total_kb.saturating_sub(current_kb);
        let eta_seconds = remaining_kb as f64 / speed_kbps as f64;
        let percent = (current_kb as f64 / total_kb as f64 * 100.0)
            .round_ties_even()
            .clamp(0.0, 100.0) as u8;

        Some(Self {
            percent,
            eta_seconds,
        })
    }

    /// The estimate reported once the archive exists
    pub fn finished() -> Self {
        Self {
            percent: 100,
            eta_seconds: 0.0,
        }
    }
}

impl From<ProgressEstimate> for ProgressEvent {
    fn from(estimate: ProgressEstimate) -> Self {
        ProgressEvent::ProgressUpdate {
            percent: estimate.percent,
            eta_seconds: estimate.eta_seconds,
        }
    }
}

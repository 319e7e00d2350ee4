// OS-level progress indicators (taskbar / terminal tab progress)
//
// Updating an indicator is always best effort. Callers log failures and carry on;
// nothing here may abort a compression job.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Mutex;

/// Capability for surfacing job progress outside the application window.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressIndicator: Send + Sync {
    /// Show `percent` (0-100) in the running state
    fn set_progress(&self, percent: u8) -> Result<()>;

    /// Show the finished state
    fn set_done(&self) -> Result<()>;

    /// Remove any progress display
    fn clear(&self) -> Result<()>;
}

/// Indicator for environments without any OS integration
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl ProgressIndicator for NoopIndicator {
    fn set_progress(&self, _percent: u8) -> Result<()> {
        Ok(())
    }

    fn set_done(&self) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Taskbar progress through the `OSC 9;4` escape sequence.
///
/// Windows Terminal and ConEmu forward this sequence to the taskbar button;
/// other terminals ignore it.
pub struct TerminalProgressIndicator<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalProgressIndicator<std::io::Stderr> {
    /// Indicator writing to the process's stderr
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalProgressIndicator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Emit `ESC ] 9 ; 4 ; <state> ; <progress> BEL`
    fn emit(&self, state: u8, progress: u8) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("Progress indicator writer poisoned"))?;
        write!(out, "\x1b]9;4;{};{}\x07", state, progress)
            .context("Failed to write taskbar progress sequence")?;
        out.flush().context("Failed to flush taskbar progress sequence")
    }

    /// Consume the indicator and return the underlying writer
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> ProgressIndicator for TerminalProgressIndicator<W> {
    fn set_progress(&self, percent: u8) -> Result<()> {
        self.emit(1, percent.min(100))
    }

    fn set_done(&self) -> Result<()> {
        // There is no dedicated "done" state; a full bar is the closest match
        self.emit(1, 100)
    }

    fn clear(&self) -> Result<()> {
        self.emit(0, 0)
    }
}

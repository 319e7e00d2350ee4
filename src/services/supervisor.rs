use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};

/// Number of output lines buffered between the pipe readers and the consumer
pub const OUTPUT_BUFFER_LINES: usize = 1024;

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Errors raised while launching or supervising the compressor
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("A compression process is already running (pid {0:?})")]
    AlreadyRunning(Option<u32>),

    #[error("Compression process {0} was not captured")]
    MissingPipe(&'static str),
}

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit status, if the process could be waited on
    pub status: Option<ExitStatus>,

    /// True when the process was terminated because cancellation was requested
    pub cancelled: bool,
}

impl ProcessExit {
    /// Exit code of the process, or -1 when unavailable (killed by a signal, wait failure)
    pub fn code(&self) -> i32 {
        self.status.and_then(|s| s.code()).unwrap_or(-1)
    }
}

/// Combined stdout/stderr of a compression process, one line at a time.
///
/// The stream is finite: it ends once both pipes are closed, which happens when
/// the process exits for any reason. It cannot be restarted.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<String>,
}

impl OutputStream {
    /// Wait for the next line. Returns `None` at end of stream.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Build a finished stream from canned lines, as if a process had printed them and exited
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // Capacity matches the line count, so this never fails
            let _ = tx.try_send(line);
        }
        Self { rx }
    }
}

/// Splits raw process output into lines.
///
/// `\n`, `\r` and `\r\n` all terminate a line, since progress meters redraw
/// themselves with bare carriage returns. Invalid UTF-8 is replaced rather than
/// rejected.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    /// Feed a chunk of bytes, returning every line it completes
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            match byte {
                b'\r' => {
                    lines.push(self.take_line());
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                }
                b'\n' => {
                    lines.push(self.take_line());
                }
                _ => {
                    self.after_cr = false;
                    self.buffer.push(byte);
                }
            }
        }

        lines
    }

    /// Flush a trailing line that was not terminated before end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}

struct ActiveProcess {
    pid: Option<u32>,
    cancel_tx: watch::Sender<bool>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl ActiveProcess {
    fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }
}

/// Owns the lifecycle of at most one external compression process.
///
/// The supervisor spawns the tool with its stdout and stderr merged into a
/// single [`OutputStream`], and lets any thread request termination through
/// [`cancel()`](Self::cancel) without blocking. A waiter task owns the child
/// and races its exit against the cancellation signal.
///
/// All methods that spawn work must be called from within a tokio runtime.
pub struct ProcessSupervisor {
    active: Mutex<Option<ActiveProcess>>,
}

impl ProcessSupervisor {
    /// Create a supervisor with no process running
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveProcess>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a supervised process is still alive
    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(ActiveProcess::is_alive)
    }

    /// Process id of the live process, if any
    pub fn pid(&self) -> Option<u32> {
        self.lock()
            .as_ref()
            .filter(|active| active.is_alive())
            .and_then(|active| active.pid)
    }

    /// Launch `program` with `args` and return its combined output stream.
    ///
    /// The program is executed directly, without an intermediate shell, so
    /// paths containing spaces or quotes need no escaping.
    ///
    /// # Errors
    /// - [`SupervisorError::AlreadyRunning`] if a previous process is still alive
    /// - [`SupervisorError::Spawn`] if the executable cannot be launched
    pub fn start<I, S>(&self, program: &str, args: I) -> Result<OutputStream, SupervisorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut slot = self.lock();

        if let Some(active) = slot.as_ref() {
            if active.is_alive() {
                tracing::warn!(
                    "Refusing to start {}: process {:?} is still running",
                    program,
                    active.pid
                );
                return Err(SupervisorError::AlreadyRunning(active.pid));
            }
        }

        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        tracing::info!(
            "Executing: {} {}",
            program,
            args.iter()
                .map(|a| format!("\"{}\"", a.to_string_lossy()))
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Keep terminal interrupts away from the child; Ctrl-C is routed through cancel()
        #[cfg(unix)]
        command.process_group(0);
        #[cfg(windows)]
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);

        let mut child = command.spawn().map_err(|source| {
            tracing::error!("Failed to spawn {}: {}", program, source);
            SupervisorError::Spawn {
                program: program.to_string(),
                source,
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(SupervisorError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SupervisorError::MissingPipe("stderr"))?;

        let (line_tx, line_rx) = mpsc::channel(OUTPUT_BUFFER_LINES);
        tokio::spawn(pump_lines(stdout, line_tx.clone(), "stdout"));
        tokio::spawn(pump_lines(stderr, line_tx, "stderr"));

        let pid = child.id();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(supervise(child, cancel_rx, exit_tx));

        tracing::debug!("Compression process started with pid {:?}", pid);

        *slot = Some(ActiveProcess {
            pid,
            cancel_tx,
            exit_rx,
        });

        Ok(OutputStream { rx: line_rx })
    }

    /// Request termination of the live process.
    ///
    /// Best effort and non-blocking: the process is killed by the waiter task
    /// and its output stream ends shortly after. Returns `false` when there is
    /// nothing to cancel.
    pub fn cancel(&self) -> bool {
        let slot = self.lock();
        match slot.as_ref() {
            Some(active) if active.is_alive() => {
                tracing::info!("Cancellation requested for process {:?}", active.pid);
                active.cancel_tx.send_replace(true);
                true
            }
            _ => {
                tracing::debug!("Cancellation requested but no process is running");
                false
            }
        }
    }

    /// Wait for the current process to exit and release it.
    ///
    /// Cancellation stays possible while waiting. Returns `None` if no process
    /// was started since the last call.
    pub async fn wait(&self) -> Option<ProcessExit> {
        let mut exit_rx = self.lock().as_ref()?.exit_rx.clone();

        let exit = match exit_rx.wait_for(Option::is_some).await {
            Ok(exit) => *exit,
            Err(_) => None,
        };

        let mut slot = self.lock();
        if slot
            .as_ref()
            .is_some_and(|active| active.exit_rx.same_channel(&exit_rx))
        {
            slot.take();
        }
        drop(slot);

        Some(exit.unwrap_or_else(|| {
            tracing::error!("Process waiter stopped without reporting an exit status");
            ProcessExit {
                status: None,
                cancelled: false,
            }
        }))
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Own the child until it exits, killing it if cancellation is signalled
async fn supervise(
    mut child: Child,
    mut cancel_rx: watch::Receiver<bool>,
    exit_tx: watch::Sender<Option<ProcessExit>>,
) {
    let pid = child.id();

    let (status, cancelled) = tokio::select! {
        status = child.wait() => (status, false),
        changed = cancel_rx.changed() => {
            if changed.is_ok() {
                tracing::warn!("Terminating compression process {:?}", pid);
            } else {
                tracing::warn!("Supervisor dropped, terminating compression process {:?}", pid);
            }

            if let Err(e) = child.start_kill() {
                tracing::debug!("Kill signal not delivered (process already exited?): {}", e);
            }
            (child.wait().await, true)
        }
    };

    let status = match status {
        Ok(status) => {
            tracing::info!("Compression process {:?} exited with {}", pid, status);
            Some(status)
        }
        Err(e) => {
            tracing::error!("Failed to wait for compression process {:?}: {}", pid, e);
            None
        }
    };

    let _ = exit_tx.send(Some(ProcessExit { status, cancelled }));
}

/// Forward lines from one pipe into the shared output channel
async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<String>, source: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&chunk[..n]) {
                    if tx.send(line).await.is_err() {
                        tracing::debug!("Output consumer gone, stopping {} reader", source);
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read compressor {}: {}", source, e);
                break;
            }
        }
    }

    if let Some(line) = splitter.finish() {
        let _ = tx.send(line).await;
    }

    tracing::debug!("Compressor {} closed", source);
}

//! Process-based game runner.
//!
//! Spawns the game as `<interpreter> <source>` and waits for at most the
//! grace period. Output goes either to pipes drained by background tasks for
//! the whole life of the process, or to per-game log files when a log
//! directory is configured. Log files outlive the launching process, pipes
//! do not.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::LaunchConfig;
use crate::diagnostic::DiagnosticFilter;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{GameHandle, GameRunner, LaunchFailure, LaunchOutcome};

/// How long to wait for the pipe readers after an early exit.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Ring buffer of the most recent output lines.
#[derive(Debug)]
struct CapturedLines {
    lines: VecDeque<String>,
    cap: usize,
}

impl CapturedLines {
    fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            cap,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() >= self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn joined(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

type SharedLines = Arc<Mutex<CapturedLines>>;

/// Log files receiving a game's output.
#[derive(Debug, Clone)]
struct OutputLogs {
    stdout: PathBuf,
    stderr: PathBuf,
}

impl OutputLogs {
    fn for_source(dir: &Path, source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "game".to_string());
        Self {
            stdout: dir.join(format!("{}.stdout.log", stem)),
            stderr: dir.join(format!("{}.stderr.log", stem)),
        }
    }

    /// Truncate both files and turn them into the child's output handles.
    fn open(&self) -> std::io::Result<(Stdio, Stdio)> {
        if let Some(dir) = self.stdout.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let stdout = File::create(&self.stdout)?;
        let stderr = File::create(&self.stderr)?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }
}

/// Last `cap` lines of a log file; empty if it cannot be read.
async fn read_tail(path: &Path, cap: usize) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            lines[lines.len().saturating_sub(cap)..].join("\n")
        }
        Err(e) => {
            debug!("Could not read {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Runner that starts games as local child processes.
pub struct ProcessRunner {
    config: LaunchConfig,
    filter: DiagnosticFilter,
}

impl ProcessRunner {
    pub fn new(config: LaunchConfig) -> Self {
        let filter = config
            .noise
            .iter()
            .fold(DiagnosticFilter::default(), |filter, pattern| {
                filter.noise(pattern.clone())
            });
        Self { config, filter }
    }

    async fn resolve_source(source: &Path) -> RunnerResult<PathBuf> {
        match tokio::fs::canonicalize(source).await {
            Ok(path) if path.is_file() => Ok(path),
            Ok(_) => Err(RunnerError::SourceNotFound(source.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RunnerError::SourceNotFound(source.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn build_command(&self, source: &Path, stdout: Stdio, stderr: Stdio) -> Command {
        let mut command = Command::new(&self.config.interpreter);
        command
            .args(&self.config.interpreter_args)
            .arg(source)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        if let Some(dir) = source.parent() {
            command.current_dir(dir);
        }

        // Keep a console window from flashing up next to the game window
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
    }

    fn spawn_reader<R>(stream: R, lines: SharedLines, label: &'static str) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        trace!("[game {}] {}", label, line);
                        lines.lock().push(line);
                    }
                    Err(e) => {
                        debug!("Stopped reading game {}: {}", label, e);
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl GameRunner for ProcessRunner {
    async fn launch(&self, source: &Path) -> RunnerResult<LaunchOutcome> {
        let source = Self::resolve_source(source).await?;
        let command_line = self.config.command_line(&source.display().to_string());
        info!("Launching game: {}", command_line);

        let logs = self
            .config
            .log_dir
            .as_deref()
            .map(|dir| OutputLogs::for_source(dir, &source));
        let (stdout_io, stderr_io) = match &logs {
            Some(logs) => logs.open()?,
            None => (Stdio::piped(), Stdio::piped()),
        };

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = self
            .build_command(&source, stdout_io, stderr_io)
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed {
                interpreter: self.config.interpreter.clone(),
                source: e,
            })?;
        let pid = child.id();
        debug!("Game process started with pid {:?}", pid);

        let stdout_lines: SharedLines =
            Arc::new(Mutex::new(CapturedLines::new(self.config.max_captured_lines)));
        let stderr_lines: SharedLines =
            Arc::new(Mutex::new(CapturedLines::new(self.config.max_captured_lines)));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(Self::spawn_reader(stdout, stdout_lines.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(Self::spawn_reader(stderr, stderr_lines.clone(), "stderr"));
        }

        let status = match tokio::time::timeout(self.config.grace_period, child.wait()).await {
            Err(_) => {
                info!(
                    "Game still running after {:?} (pid {:?})",
                    self.config.grace_period, pid
                );
                return Ok(LaunchOutcome::Running(Box::new(ChildHandle {
                    child,
                    pid,
                    readers,
                })));
            }
            Ok(Err(e)) => {
                for reader in &readers {
                    reader.abort();
                }
                return Err(RunnerError::WaitFailed(e.to_string()));
            }
            Ok(Ok(status)) => status,
        };

        let (stdout, stderr) = match &logs {
            Some(logs) => {
                let cap = self.config.max_captured_lines;
                (read_tail(&logs.stdout, cap).await, read_tail(&logs.stderr, cap).await)
            }
            None => {
                // A detached grandchild may still hold the pipes open
                let drain = async {
                    for reader in readers {
                        let _ = reader.await;
                    }
                };
                if tokio::time::timeout(READER_DRAIN_TIMEOUT, drain).await.is_err() {
                    debug!("Output readers did not finish; using partial output");
                }
                (stdout_lines.lock().joined(), stderr_lines.lock().joined())
            }
        };
        let exit_code = status.code();
        let diagnostic = self.filter.classify(&stderr, exit_code);

        warn!(
            "Game exited within grace period (code {:?}): {}",
            exit_code,
            diagnostic.lines().next().unwrap_or_default()
        );

        Ok(LaunchOutcome::Failed(LaunchFailure {
            exit_code,
            stdout,
            stderr,
            diagnostic,
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        }))
    }

    fn stop_timeout(&self) -> Duration {
        self.config.stop_timeout
    }
}

/// Handle to a game running as a child process.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
}

impl ChildHandle {
    fn abort_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }

    /// Ask the process to exit on its own.
    async fn request_terminate(pid: u32) -> Result<(), String> {
        #[cfg(unix)]
        let output = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .output()
            .await;

        #[cfg(windows)]
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(String::from_utf8_lossy(&out.stderr).trim().to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Whether `pid` is alive and its command line mentions `marker`.
///
/// The marker guards against a recorded pid that the OS has since handed to
/// an unrelated process. On Windows only the pid is checked.
pub async fn process_alive(pid: u32, marker: &str) -> bool {
    match process_command_line(pid).await {
        Some(line) => cfg!(windows) || line.contains(marker),
        None => false,
    }
}

#[cfg(target_os = "linux")]
async fn process_command_line(pid: u32) -> Option<String> {
    let bytes = tokio::fs::read(format!("/proc/{}/cmdline", pid)).await.ok()?;
    // Zombies have an empty command line
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).replace('\0', " "))
}

#[cfg(all(unix, not(target_os = "linux")))]
async fn process_command_line(pid: u32) -> Option<String> {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "args="])
        .output()
        .await
        .ok()?;
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !line.is_empty()).then_some(line)
}

#[cfg(windows)]
async fn process_command_line(pid: u32) -> Option<String> {
    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/FO", "CSV", "/NH"])
        .output()
        .await
        .ok()?;
    let listing = String::from_utf8_lossy(&output.stdout).into_owned();
    listing.contains(&format!("\"{}\"", pid)).then_some(listing)
}

/// Ask a process this runner no longer holds a handle for to exit.
///
/// Used for games left running by an earlier, detached session. Only the
/// request is sent; the caller cannot wait on a process it did not spawn.
pub async fn terminate_pid(pid: u32) -> RunnerResult<()> {
    ChildHandle::request_terminate(pid)
        .await
        .map_err(|message| RunnerError::StopFailed { pid, message })
}

#[async_trait]
impl GameHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                debug!("try_wait failed for pid {:?}: {}", self.pid, e);
                true
            }
        }
    }

    async fn stop(&mut self, timeout: Duration) -> RunnerResult<()> {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("Game {:?} already exited ({})", self.pid, status);
            self.abort_readers();
            return Ok(());
        }

        let pid = match self.pid {
            Some(pid) => pid,
            None => {
                self.abort_readers();
                return Ok(());
            }
        };

        info!("Stopping game process {}", pid);
        match Self::request_terminate(pid).await {
            Ok(()) => match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("Game {} exited after terminate ({})", pid, status);
                    self.abort_readers();
                    return Ok(());
                }
                Ok(Err(e)) => warn!("Waiting for game {} failed: {}", pid, e),
                Err(_) => warn!("Game {} did not exit within {:?}, killing", pid, timeout),
            },
            Err(message) => warn!("Terminate request for game {} failed: {}", pid, message),
        }

        let result = self.child.kill().await;
        self.abort_readers();
        match result {
            Ok(()) => Ok(()),
            Err(_) if matches!(self.child.try_wait(), Ok(Some(_))) => Ok(()),
            Err(e) => Err(RunnerError::StopFailed {
                pid,
                message: e.to_string(),
            }),
        }
    }
}

//! Game runner trait and launch results.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RunnerResult;

/// Report for a game that exited inside the grace period.
#[derive(Debug, Clone)]
pub struct LaunchFailure {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Filtered error text suitable for a repair prompt.
    pub diagnostic: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl LaunchFailure {
    /// Exit code as reported to users; signals map to -1.
    pub fn display_code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Outcome of a launch attempt.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The process survived the grace period.
    Running(Box<dyn GameHandle>),
    /// The process exited inside the grace period.
    Failed(LaunchFailure),
}

impl LaunchOutcome {
    pub fn is_running(&self) -> bool {
        matches!(self, LaunchOutcome::Running(_))
    }
}

/// Handle to a running game process.
#[async_trait]
pub trait GameHandle: Send + Debug {
    /// OS process id, if still known.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking check whether the process has exited.
    fn has_exited(&mut self) -> bool;

    /// Terminate gracefully, then force-kill after `timeout`.
    ///
    /// Safe to call more than once and on a process that already exited.
    async fn stop(&mut self, timeout: Duration) -> RunnerResult<()>;
}

/// Trait for launching game sources.
#[async_trait]
pub trait GameRunner: Send + Sync {
    /// Start `source` and classify it after the grace period.
    async fn launch(&self, source: &Path) -> RunnerResult<LaunchOutcome>;

    /// Timeout used when stopping handles produced by this runner.
    fn stop_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

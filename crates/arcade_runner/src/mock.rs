//! Mock game runner for testing.
//!
//! Provides a scripted implementation of the GameRunner trait for use in
//! tests that should not start real processes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::diagnostic::DiagnosticFilter;
use crate::error::RunnerResult;
use crate::runner::{GameHandle, GameRunner, LaunchFailure, LaunchOutcome};

/// Scripted result for a single launch call.
#[derive(Debug, Clone)]
pub enum MockLaunch {
    /// The game survives the grace period.
    Runs,
    /// The game exits inside the grace period.
    Crashes { exit_code: Option<i32>, stderr: String },
}

impl MockLaunch {
    pub fn crash(exit_code: i32, stderr: impl Into<String>) -> Self {
        MockLaunch::Crashes {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
        }
    }

    /// A crash with a Python traceback ending in `error_line`.
    pub fn traceback(error_line: impl Into<String>) -> Self {
        let error_line = error_line.into();
        Self::crash(
            1,
            format!(
                "Traceback (most recent call last):\n  File \"game.py\", line 1, in <module>\n{}",
                error_line
            ),
        )
    }
}

/// Handle returned for scripted running games.
#[derive(Debug, Clone)]
pub struct MockHandle {
    pid: u32,
    exited: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
}

impl MockHandle {
    /// Simulate the game exiting on its own.
    pub fn exit(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameHandle for MockHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn has_exited(&mut self) -> bool {
        self.is_exited()
    }

    async fn stop(&mut self, _timeout: Duration) -> RunnerResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock game runner for testing.
///
/// Returns scripted outcomes in order; once the script is exhausted the
/// last entry repeats. With an empty script every launch runs. Crash
/// diagnostics go through the real [`DiagnosticFilter`].
#[derive(Clone)]
pub struct MockRunner {
    script: Arc<RwLock<Vec<MockLaunch>>>,
    index: Arc<AtomicUsize>,
    launched: Arc<RwLock<Vec<PathBuf>>>,
    handles: Arc<RwLock<Vec<MockHandle>>>,
    filter: DiagnosticFilter,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(Vec::new())),
            index: Arc::new(AtomicUsize::new(0)),
            launched: Arc::new(RwLock::new(Vec::new())),
            handles: Arc::new(RwLock::new(Vec::new())),
            filter: DiagnosticFilter::default(),
        }
    }

    /// Append an outcome to the script.
    pub fn add_launch(self, launch: MockLaunch) -> Self {
        self.script.write().push(launch);
        self
    }

    /// Every launch returns the same outcome.
    pub fn always(self, launch: MockLaunch) -> Self {
        {
            let mut script = self.script.write();
            script.clear();
            script.push(launch);
        }
        self.index.store(0, Ordering::SeqCst);
        self
    }

    /// Paths passed to `launch`, in order.
    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.read().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.read().len()
    }

    /// Handles given out for running launches.
    pub fn handles(&self) -> Vec<MockHandle> {
        self.handles.read().clone()
    }

    fn next_launch(&self) -> MockLaunch {
        let script = self.script.read();
        if script.is_empty() {
            return MockLaunch::Runs;
        }
        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        script[idx.min(script.len() - 1)].clone()
    }
}

#[async_trait]
impl GameRunner for MockRunner {
    async fn launch(&self, source: &Path) -> RunnerResult<LaunchOutcome> {
        self.launched.write().push(source.to_path_buf());

        match self.next_launch() {
            MockLaunch::Runs => {
                let handle = MockHandle {
                    pid: 10_000 + self.launch_count() as u32,
                    exited: Arc::new(AtomicBool::new(false)),
                    stop_calls: Arc::new(AtomicUsize::new(0)),
                };
                self.handles.write().push(handle.clone());
                Ok(LaunchOutcome::Running(Box::new(handle)))
            }
            MockLaunch::Crashes { exit_code, stderr } => {
                let now = Utc::now();
                Ok(LaunchOutcome::Failed(LaunchFailure {
                    exit_code,
                    diagnostic: self.filter.classify(&stderr, exit_code),
                    stdout: String::new(),
                    stderr,
                    started_at: now,
                    finished_at: now,
                    duration_ms: 50,
                }))
            }
        }
    }
}

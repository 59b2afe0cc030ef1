//! Launch configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for launching game processes.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Interpreter executable (e.g. `python3`).
    pub interpreter: String,
    /// Arguments placed before the source path.
    pub interpreter_args: Vec<String>,
    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
    /// How long a fresh process must survive to count as running.
    pub grace_period: Duration,
    /// How long `stop` waits after a terminate request before killing.
    pub stop_timeout: Duration,
    /// Maximum number of captured lines kept per stream.
    pub max_captured_lines: usize,
    /// Extra stderr patterns that never count as errors.
    pub noise: Vec<String>,
    /// Write game output to `<log_dir>/<game>.stdout.log` and
    /// `<game>.stderr.log` instead of pipes, so the game keeps running
    /// unharmed once the launching process is gone.
    pub log_dir: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            interpreter: Interpreter::PYTHON.to_string(),
            interpreter_args: Vec::new(),
            env: HashMap::new(),
            grace_period: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
            max_captured_lines: 500,
            noise: Vec::new(),
            log_dir: None,
        }
    }
}

impl LaunchConfig {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.interpreter_args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn max_captured_lines(mut self, lines: usize) -> Self {
        self.max_captured_lines = lines.max(1);
        self
    }

    pub fn noise(mut self, pattern: impl Into<String>) -> Self {
        self.noise.push(pattern.into());
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Full command line for display in logs.
    pub fn command_line(&self, source: &str) -> String {
        let mut parts = vec![self.interpreter.clone()];
        parts.extend(self.interpreter_args.iter().cloned());
        parts.push(source.to_string());
        parts.join(" ")
    }
}

/// Well-known interpreter names.
pub struct Interpreter;

impl Interpreter {
    #[cfg(windows)]
    pub const PYTHON: &'static str = "python";
    #[cfg(not(windows))]
    pub const PYTHON: &'static str = "python3";

    pub const SH: &'static str = "sh";
}

//! Crash diagnostics.
//!
//! Turns the stderr of a game that exited too early into a short error
//! report. Noise lines printed by the framework on every start are dropped,
//! then only lines that look like part of an error are kept. Both lists are
//! best-effort and tuned for pygame.

/// Fallback message for a clean exit with no error output.
pub const MISSING_LOOP_MESSAGE: &str = "Game completed successfully but exited immediately. \
This usually means the game is missing a proper game loop (while True loop) or has a \
logical error that causes it to finish execution quickly.";

/// Lines containing any of these are never part of a diagnostic.
const DEFAULT_NOISE: &[&str] = &[
    "UserWarning",
    "pkg_resources is deprecated",
    "from pkg_resources import",
    "pygame community",
    "https://www.pygame.org",
];

/// Lines containing any of these are considered error output.
const DEFAULT_INDICATORS: &[&str] = &[
    "Error",
    "Exception",
    "Traceback",
    "File \"",
    "line ",
    "NameError",
    "ImportError",
    "SyntaxError",
    "AttributeError",
    "TypeError",
    "ValueError",
];

/// Filter that extracts error lines from captured stderr.
#[derive(Debug, Clone)]
pub struct DiagnosticFilter {
    noise: Vec<String>,
    indicators: Vec<String>,
}

impl Default for DiagnosticFilter {
    fn default() -> Self {
        Self {
            noise: DEFAULT_NOISE.iter().map(|s| s.to_string()).collect(),
            indicators: DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DiagnosticFilter {
    /// Also drop lines containing `pattern`.
    pub fn noise(mut self, pattern: impl Into<String>) -> Self {
        self.noise.push(pattern.into());
        self
    }

    fn is_noise(&self, line: &str) -> bool {
        self.noise.iter().any(|n| line.contains(n.as_str()))
    }

    fn is_error(&self, line: &str) -> bool {
        self.indicators.iter().any(|i| line.contains(i.as_str()))
    }

    /// Stderr lines that survive the noise filter and look like errors.
    pub fn error_lines<'a>(&self, stderr: &'a str) -> Vec<&'a str> {
        stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| !self.is_noise(line))
            .filter(|line| self.is_error(line))
            .collect()
    }

    /// Build the diagnostic for a process that exited inside the grace period.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    pub fn classify(&self, stderr: &str, exit_code: Option<i32>) -> String {
        let lines = self.error_lines(stderr);
        if !lines.is_empty() {
            return lines.join("\n");
        }

        match exit_code {
            Some(0) => MISSING_LOOP_MESSAGE.to_string(),
            Some(code) => format!(
                "Game exited with code {} but no error message was captured",
                code
            ),
            None => "Game exited with code -1 but no error message was captured".to_string(),
        }
    }
}

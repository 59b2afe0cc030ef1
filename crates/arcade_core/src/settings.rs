//! Application settings.
//!
//! Resolution order: built-in defaults, then `<data_dir>/settings.json`,
//! then `ARCADE_*` environment variables. The CLI applies its flags last.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arcade_llm::ClientConfig;
use arcade_runner::{Interpreter, LaunchConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ENV_SERVER_URL: &str = "ARCADE_SERVER_URL";
pub const ENV_MODEL: &str = "ARCADE_MODEL";
pub const ENV_DATA_DIR: &str = "ARCADE_DATA_DIR";
pub const ENV_PYTHON: &str = "ARCADE_PYTHON";
pub const ENV_BUILTIN_DIR: &str = "ARCADE_BUILTIN_DIR";

const SETTINGS_FILE: &str = "settings.json";
const BUILTIN_DIR_NAME: &str = "builtin_games";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArcadeSettings {
    pub server_url: String,
    pub model: String,
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub builtin_dir: Option<PathBuf>,
    pub interpreter: String,
    pub grace_period_ms: u64,
    pub stop_timeout_ms: u64,
    pub generation_idle_timeout_secs: u64,
    pub title_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub max_tokens: u32,
    /// Extra stderr patterns ignored when diagnosing a crash.
    pub diagnostic_noise: Vec<String>,
}

impl Default for ArcadeSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            model: "Qwen3-Coder-30B-A3B-Instruct-GGUF".to_string(),
            data_dir: Self::default_data_dir(),
            builtin_dir: None,
            interpreter: Interpreter::PYTHON.to_string(),
            grace_period_ms: 2000,
            stop_timeout_ms: 5000,
            generation_idle_timeout_secs: 120,
            title_timeout_secs: 30,
            status_timeout_secs: 10,
            max_tokens: 4000,
            diagnostic_noise: Vec::new(),
        }
    }
}

impl ArcadeSettings {
    /// `~/.lemonade-arcade`, or `./.lemonade-arcade` without a home directory.
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lemonade-arcade")
    }

    /// Load settings using the process environment.
    pub fn load() -> Self {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load settings using `lookup` for environment variables.
    pub fn load_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_data_dir);

        let mut settings = Self::load_from(&data_dir);
        settings.apply_env(lookup);
        settings
    }

    /// Read `<data_dir>/settings.json` on top of the defaults.
    pub fn load_from(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let mut settings = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ArcadeSettings>(&content) {
                Ok(settings) => {
                    debug!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        settings.data_dir = data_dir.to_path_buf();
        settings
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(python) = get(ENV_PYTHON) {
            self.interpreter = python;
        }
        if let Some(dir) = get(ENV_BUILTIN_DIR) {
            self.builtin_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn games_dir(&self) -> PathBuf {
        self.data_dir.join("games")
    }

    /// Per-game stdout and stderr logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Directory holding the packaged built-in game sources.
    ///
    /// Explicit setting first, then `builtin_games` next to the executable,
    /// then the copy in the source tree.
    pub fn resolve_builtin_dir(&self) -> PathBuf {
        if let Some(dir) = &self.builtin_dir {
            return dir.clone();
        }

        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(BUILTIN_DIR_NAME)))
            .filter(|dir| dir.is_dir());
        if let Some(dir) = beside_exe {
            return dir;
        }

        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(BUILTIN_DIR_NAME)
    }

    pub fn launch_config(&self) -> LaunchConfig {
        let config = LaunchConfig::new(self.interpreter.clone())
            .grace_period(Duration::from_millis(self.grace_period_ms))
            .stop_timeout(Duration::from_millis(self.stop_timeout_ms))
            .log_dir(self.logs_dir());
        self.diagnostic_noise
            .iter()
            .fold(config, |config, pattern| config.noise(pattern.clone()))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.server_url.clone())
            .idle_timeout(Duration::from_secs(self.generation_idle_timeout_secs))
            .request_timeout(Duration::from_secs(self.title_timeout_secs))
            .status_timeout(Duration::from_secs(self.status_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = ArcadeSettings::default();
        assert_eq!(settings.server_url, "http://localhost:8000");
        assert_eq!(settings.grace_period_ms, 2000);
        assert!(settings.data_dir.ends_with(".lemonade-arcade"));
        assert!(settings.games_dir().ends_with(".lemonade-arcade/games"));
    }

    #[test]
    fn test_file_then_env() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"serverUrl": "http://gpu-box:8000", "model": "file-model", "gracePeriodMs": 3000}"#,
        )
        .unwrap();

        let env: HashMap<&str, String> = [
            (ENV_DATA_DIR, dir.path().display().to_string()),
            (ENV_MODEL, "env-model".to_string()),
        ]
        .into_iter()
        .collect();
        let settings = ArcadeSettings::load_with(|key| env.get(key).cloned());

        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.server_url, "http://gpu-box:8000");
        assert_eq!(settings.model, "env-model");
        assert_eq!(settings.grace_period_ms, 3000);
        assert_eq!(settings.stop_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_file_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), "[1, 2").unwrap();

        let settings = ArcadeSettings::load_from(dir.path());
        assert_eq!(settings.model, ArcadeSettings::default().model);
        assert_eq!(settings.data_dir, dir.path());
    }

    #[test]
    fn test_explicit_builtin_dir() {
        let settings = ArcadeSettings {
            builtin_dir: Some(PathBuf::from("/opt/games")),
            ..Default::default()
        };
        assert_eq!(settings.resolve_builtin_dir(), PathBuf::from("/opt/games"));
    }

    #[test]
    fn test_launch_config_logs_and_noise() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"gracePeriodMs": 300, "diagnosticNoise": ["ALSA lib", "Fontconfig"]}"#,
        )
        .unwrap();

        let config = ArcadeSettings::load_from(dir.path()).launch_config();
        assert_eq!(config.grace_period, Duration::from_millis(300));
        assert_eq!(config.log_dir, Some(dir.path().join("logs")));
        assert_eq!(config.noise, vec!["ALSA lib".to_string(), "Fontconfig".to_string()]);
    }
}

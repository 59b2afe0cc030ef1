//! Game artifacts and their persisted form.

use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated or built-in game.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub title: String,
    /// Description the game was generated from.
    pub prompt: String,
    /// Seconds since the Unix epoch; `0.0` for built-ins.
    pub created: f64,
    pub is_builtin: bool,
    pub source_location: PathBuf,
}

impl Artifact {
    /// A freshly generated game stored under `games_dir`.
    pub fn generated(
        id: impl Into<String>,
        title: impl Into<String>,
        prompt: impl Into<String>,
        games_dir: &Path,
    ) -> Self {
        let id = id.into();
        Self {
            source_location: games_dir.join(format!("{}.py", id)),
            id,
            title: title.into(),
            prompt: prompt.into(),
            created: now_timestamp(),
            is_builtin: false,
        }
    }

    /// Prompt as shown to users; built-in prompts stay hidden.
    pub fn visible_prompt(&self) -> Option<&str> {
        if self.is_builtin {
            None
        } else {
            Some(&self.prompt)
        }
    }

    pub(crate) fn to_record(&self) -> GameRecord {
        GameRecord {
            title: self.title.clone(),
            created: self.created,
            prompt: Some(self.prompt.clone()),
            builtin: self.is_builtin,
            file: if self.is_builtin {
                self.source_location
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            } else {
                None
            },
        }
    }
}

/// Entry of the persisted metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GameRecord {
    pub title: String,
    #[serde(default)]
    pub created: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub builtin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// A game packaged with the application.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinGame {
    pub id: &'static str,
    pub title: &'static str,
    pub prompt: &'static str,
    pub file: &'static str,
}

impl BuiltinGame {
    pub fn artifact(&self, builtin_dir: &Path) -> Artifact {
        Artifact {
            id: self.id.to_string(),
            title: self.title.to_string(),
            prompt: self.prompt.to_string(),
            created: 0.0,
            is_builtin: true,
            source_location: builtin_dir.join(self.file),
        }
    }
}

pub const BUILTIN_GAMES: &[BuiltinGame] = &[
    BuiltinGame {
        id: "builtin_snake",
        title: "Dynamic Snake",
        prompt: "Snake but the food moves around",
        file: "snake_moving_food.py",
    },
    BuiltinGame {
        id: "builtin_invaders",
        title: "Rainbow Space Invaders",
        prompt: "Space invaders with rainbow colors",
        file: "rainbow_space_invaders.py",
    },
];

pub fn is_builtin_id(id: &str) -> bool {
    BUILTIN_GAMES.iter().any(|game| game.id == id)
}

/// Current time as fractional Unix seconds.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Short random id: the first 8 hex digits of a v4 UUID.
pub fn random_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Title for a remix: `"Snake"` becomes `"Snake v2"`, `"Snake v2"` becomes `"Snake v3"`.
pub fn remix_title(title: &str) -> String {
    let title = title.trim();
    if let Ok(re) = Regex::new(r"^(.*\S)\s+v(\d+)$") {
        if let Some(caps) = re.captures(title) {
            if let Ok(version) = caps[2].parse::<u32>() {
                return format!("{} v{}", &caps[1], version.saturating_add(1));
            }
        }
    }
    format!("{} v2", title)
}

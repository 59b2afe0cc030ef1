//! Games started by any `arcade` invocation.
//!
//! The engine only sees processes it spawned itself, so the one-game limit
//! across invocations is kept through `<data_dir>/active_games.json`. Each
//! entry pairs a process id with the game's source file name; an entry whose
//! process is gone, or whose pid now runs something else, is dropped on open.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arcade_runner::{process_alive, terminate_pid};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const ACTIVE_FILE: &str = "active_games.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGame {
    pub pid: u32,
    /// Source file name; must appear in the process command line.
    pub file: String,
}

pub struct ActiveGames {
    path: PathBuf,
    games: BTreeMap<String, ActiveGame>,
}

impl ActiveGames {
    /// Load the record and forget games whose process has exited.
    ///
    /// A missing or unreadable file is an empty record.
    pub async fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(ACTIVE_FILE);
        let recorded: BTreeMap<String, ActiveGame> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring invalid {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        let mut games = BTreeMap::new();
        let mut pruned = false;
        for (id, game) in recorded {
            if process_alive(game.pid, &game.file).await {
                games.insert(id, game);
            } else {
                debug!("Forgetting game {}: process {} is gone", id, game.pid);
                pruned = true;
            }
        }

        let active = Self { path, games };
        if pruned {
            if let Err(e) = active.save() {
                warn!("{:#}", e);
            }
        }
        active
    }

    pub fn contains(&self, id: &str) -> bool {
        self.games.contains_key(id)
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.games.keys().cloned().collect()
    }

    pub fn record(&mut self, id: &str, pid: u32, file: impl Into<String>) -> Result<()> {
        self.games.insert(
            id.to_string(),
            ActiveGame {
                pid,
                file: file.into(),
            },
        );
        self.save()
    }

    /// Remove and return the entry for `id`.
    pub fn take(&mut self, id: &str) -> Result<Option<ActiveGame>> {
        let game = self.games.remove(id);
        if game.is_some() {
            self.save()?;
        }
        Ok(game)
    }

    /// Terminate every recorded game and clear the record.
    pub async fn stop_all(&mut self) -> Result<Vec<String>> {
        if self.games.is_empty() {
            return Ok(Vec::new());
        }

        let games = std::mem::take(&mut self.games);
        for (id, game) in &games {
            info!("Stopping game {} (process {})", id, game.pid);
            if let Err(e) = terminate_pid(game.pid).await {
                warn!("Could not stop process {}: {}", game.pid, e);
            }
        }
        self.save()?;
        Ok(games.into_keys().collect())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.games)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Saved {} active game(s)", self.games.len());
        Ok(())
    }
}

//! Persisted game catalog.
//!
//! The catalog maps game ids to metadata and mirrors every change to
//! `<games_dir>/metadata.json`. Built-in games are seeded on every load and
//! their packaged definitions always win over whatever the file says.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::artifact::{is_builtin_id, random_id, Artifact, GameRecord, BUILTIN_GAMES};
use crate::error::{CoreError, CoreResult};

const METADATA_FILE: &str = "metadata.json";

pub struct Catalog {
    games_dir: PathBuf,
    builtin_dir: PathBuf,
    games: RwLock<BTreeMap<String, Artifact>>,
}

impl Catalog {
    /// Empty catalog containing only the built-ins. Nothing is read from disk.
    pub fn new(games_dir: impl Into<PathBuf>, builtin_dir: impl Into<PathBuf>) -> Self {
        let catalog = Self {
            games_dir: games_dir.into(),
            builtin_dir: builtin_dir.into(),
            games: RwLock::new(BTreeMap::new()),
        };
        catalog.seed_builtins();
        catalog
    }

    /// Load the catalog from `<games_dir>/metadata.json`.
    ///
    /// A missing or unreadable file yields a catalog with only the built-ins.
    pub fn load(games_dir: impl Into<PathBuf>, builtin_dir: impl Into<PathBuf>) -> Self {
        let catalog = Self {
            games_dir: games_dir.into(),
            builtin_dir: builtin_dir.into(),
            games: RwLock::new(BTreeMap::new()),
        };

        if let Err(e) = fs::create_dir_all(&catalog.games_dir) {
            warn!(
                "Could not create games directory {}: {}",
                catalog.games_dir.display(),
                e
            );
        }

        let records = catalog.read_records();
        {
            let mut games = catalog.games.write();
            for (id, record) in records {
                if is_builtin_id(&id) || record.builtin {
                    continue;
                }
                let artifact = Artifact {
                    source_location: catalog.games_dir.join(format!("{}.py", id)),
                    id: id.clone(),
                    title: record.title,
                    prompt: record.prompt.unwrap_or_default(),
                    created: record.created,
                    is_builtin: false,
                };
                games.insert(id, artifact);
            }
        }
        catalog.seed_builtins();

        info!(
            "Loaded {} games from {}",
            catalog.games.read().len(),
            catalog.metadata_path().display()
        );
        catalog
    }

    fn read_records(&self) -> BTreeMap<String, GameRecord> {
        let path = self.metadata_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No metadata file at {}", path.display());
                return BTreeMap::new();
            }
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring corrupt metadata file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn seed_builtins(&self) {
        let mut games = self.games.write();
        for builtin in BUILTIN_GAMES {
            games.insert(builtin.id.to_string(), builtin.artifact(&self.builtin_dir));
        }
    }

    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }

    pub fn builtin_dir(&self) -> &Path {
        &self.builtin_dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.games_dir.join(METADATA_FILE)
    }

    /// Write the metadata file. Failures are logged and reported as `false`.
    pub fn save(&self) -> bool {
        let snapshot: BTreeMap<String, GameRecord> = self
            .games
            .read()
            .iter()
            .map(|(id, artifact)| (id.clone(), artifact.to_record()))
            .collect();

        match self.write_atomically(&snapshot) {
            Ok(()) => {
                debug!("Saved {} games to metadata", snapshot.len());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to save metadata to {}: {}",
                    self.metadata_path().display(),
                    e
                );
                false
            }
        }
    }

    fn write_atomically(&self, snapshot: &BTreeMap<String, GameRecord>) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::create_dir_all(&self.games_dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.games_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.metadata_path()).map_err(|e| e.error)?;
        Ok(())
    }

    /// Add a new game and persist.
    pub fn register(&self, artifact: Artifact) -> CoreResult<()> {
        {
            let mut games = self.games.write();
            if games.contains_key(&artifact.id) {
                return Err(CoreError::DuplicateId(artifact.id));
            }
            debug!("Registering game {} ({})", artifact.id, artifact.title);
            games.insert(artifact.id.clone(), artifact);
        }
        self.save();
        Ok(())
    }

    /// Remove a user game and persist. Built-ins cannot be removed.
    pub fn remove(&self, id: &str) -> CoreResult<Artifact> {
        let removed = {
            let mut games = self.games.write();
            let is_builtin = match games.get(id) {
                Some(artifact) => artifact.is_builtin,
                None => return Err(CoreError::GameNotFound(id.to_string())),
            };
            if is_builtin {
                return Err(CoreError::BuiltinGame(id.to_string()));
            }
            games.remove(id)
        };
        self.save();
        removed.ok_or_else(|| CoreError::GameNotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<Artifact> {
        self.games.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.games.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.games.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.read().is_empty()
    }

    /// User games newest first, then built-ins.
    pub fn list(&self) -> Vec<Artifact> {
        let mut games: Vec<Artifact> = self.games.read().values().cloned().collect();
        games.sort_by(|a, b| {
            a.is_builtin
                .cmp(&b.is_builtin)
                .then(b.created.total_cmp(&a.created))
                .then(a.id.cmp(&b.id))
        });
        games
    }

    /// Fresh id not used by any game or stray source file.
    pub fn new_id(&self) -> String {
        loop {
            let id = random_id();
            if !self.contains(&id) && !self.user_source_path(&id).exists() {
                return id;
            }
        }
    }

    fn user_source_path(&self, id: &str) -> PathBuf {
        self.games_dir.join(format!("{}.py", id))
    }

    /// Where the source of `id` lives. Unregistered ids map to the games directory.
    pub fn source_path(&self, id: &str) -> PathBuf {
        match self.get(id) {
            Some(artifact) => artifact.source_location,
            None => self.user_source_path(id),
        }
    }

    /// Write generated source for a user game.
    pub fn write_source(&self, id: &str, code: &str) -> CoreResult<PathBuf> {
        if is_builtin_id(id) {
            return Err(CoreError::BuiltinGame(id.to_string()));
        }
        fs::create_dir_all(&self.games_dir)?;
        let path = self.user_source_path(id);
        fs::write(&path, code)?;
        debug!("Wrote {} bytes of source to {}", code.len(), path.display());
        Ok(path)
    }

    /// Source of a user game. Built-in sources are not exposed.
    pub fn read_source(&self, id: &str) -> CoreResult<String> {
        let artifact = self
            .get(id)
            .ok_or_else(|| CoreError::GameNotFound(id.to_string()))?;
        if artifact.is_builtin {
            return Err(CoreError::BuiltinGame(id.to_string()));
        }
        Ok(fs::read_to_string(&artifact.source_location)?)
    }

    /// Delete a user game's source file; a missing file is not an error.
    pub fn delete_source(&self, id: &str) -> CoreResult<()> {
        if is_builtin_id(id) {
            return Err(CoreError::BuiltinGame(id.to_string()));
        }
        match fs::remove_file(self.user_source_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

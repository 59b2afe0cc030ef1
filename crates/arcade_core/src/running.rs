//! Registry of running games.
//!
//! At most one game runs at a time. User-initiated launches must claim the
//! single launch slot first and are refused while anything else runs or is
//! being launched. Automatic launches from a create or remix session skip
//! the claim; tracking their handle evicts whatever else was running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arcade_runner::GameHandle;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

#[derive(Default)]
struct RunningState {
    games: HashMap<String, Box<dyn GameHandle>>,
    pending: Option<String>,
}

pub struct RunningGames {
    state: Mutex<RunningState>,
    stop_timeout: Duration,
}

/// Reservation of the launch slot; released on drop.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct LaunchSlot {
    registry: Arc<RunningGames>,
    id: String,
}

impl Drop for LaunchSlot {
    fn drop(&mut self) {
        let mut state = self.registry.state.lock();
        if state.pending.as_deref() == Some(self.id.as_str()) {
            state.pending = None;
        }
    }
}

impl RunningGames {
    pub fn new(stop_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RunningState::default()),
            stop_timeout,
        }
    }

    /// Reserve the launch slot for `id`.
    ///
    /// Fails with [`CoreError::AlreadyRunning`] if any game is running or a
    /// launch is already in progress.
    pub fn try_claim(self: &Arc<Self>, id: &str) -> CoreResult<LaunchSlot> {
        self.reap();
        let mut state = self.state.lock();
        if !state.games.is_empty() || state.pending.is_some() {
            return Err(CoreError::AlreadyRunning);
        }
        state.pending = Some(id.to_string());
        Ok(LaunchSlot {
            registry: Arc::clone(self),
            id: id.to_string(),
        })
    }

    /// Record a running game and stop anything else that was running.
    pub async fn track(&self, id: &str, handle: Box<dyn GameHandle>) {
        let evicted: Vec<(String, Box<dyn GameHandle>)> = {
            let mut state = self.state.lock();
            let others: Vec<String> = state
                .games
                .keys()
                .filter(|key| key.as_str() != id)
                .cloned()
                .collect();
            let evicted = others
                .into_iter()
                .filter_map(|key| state.games.remove(&key).map(|h| (key, h)))
                .collect();
            if let Some(mut previous) = state.games.insert(id.to_string(), handle) {
                if !previous.has_exited() {
                    warn!("Replacing live handle for game {}", id);
                }
            }
            evicted
        };

        info!("Game {} is running", id);
        for (other, mut handle) in evicted {
            info!("Stopping game {} to make room for {}", other, id);
            if let Err(e) = handle.stop(self.stop_timeout).await {
                warn!("Failed to stop game {}: {}", other, e);
            }
        }
    }

    /// Stop `id` if it is running. Returns whether a handle was found.
    ///
    /// The entry is removed before termination is attempted, so it is gone
    /// even when stopping fails.
    pub async fn stop(&self, id: &str) -> bool {
        let handle = self.state.lock().games.remove(id);
        let Some(mut handle) = handle else {
            debug!("Stop requested for {} but it is not running", id);
            return false;
        };

        info!("Stopping game {} (pid {:?})", id, handle.pid());
        if let Err(e) = handle.stop(self.stop_timeout).await {
            warn!("Failed to stop game {}: {}", id, e);
        }
        true
    }

    /// Stop every running game.
    pub async fn stop_all(&self) {
        for id in self.running_ids() {
            self.stop(&id).await;
        }
    }

    /// Drop handles whose process has exited. Never blocks on a process.
    pub fn reap(&self) -> Vec<String> {
        let mut state = self.state.lock();
        let finished: Vec<String> = state
            .games
            .iter_mut()
            .filter_map(|(id, handle)| handle.has_exited().then(|| id.clone()))
            .collect();
        for id in &finished {
            state.games.remove(id);
            debug!("Game {} has exited", id);
        }
        finished
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.reap();
        self.state.lock().games.contains_key(id)
    }

    /// OS process id of a running game, if the runner exposes one.
    pub fn pid_of(&self, id: &str) -> Option<u32> {
        self.state.lock().games.get(id).and_then(|handle| handle.pid())
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.state.lock().games.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().games.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().games.len()
    }
}

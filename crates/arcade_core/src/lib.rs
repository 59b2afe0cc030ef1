//! # arcade_core
//!
//! Game catalog and lifecycle orchestration for Arcade.
//!
//! This crate ties the model client and the process launcher together:
//! a user describes a game, the model writes it, the engine saves and
//! launches it, and an early crash triggers one automatic repair pass.
//!
//! # Architecture
//!
//! - **Catalog**: persisted id → metadata map, with read-only built-ins
//! - **RunningGames**: handles of running games, at most one at a time
//! - **ArcadeEngine**: the create / remix / launch state machine
//! - **GameEvent**: the ordered event stream each session produces
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arcade_core::{ArcadeEngine, ArcadeSettings, GameEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Arc::new(ArcadeEngine::from_settings(&ArcadeSettings::load())?);
//! let mut events = engine.spawn_create("snake but the food moves around");
//!
//! while let Some(event) = events.recv().await {
//!     print!("{}", event.to_sse_frame());
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod events;
pub mod running;
pub mod settings;

pub use artifact::{remix_title, Artifact, BuiltinGame, BUILTIN_GAMES};
pub use catalog::Catalog;
pub use engine::{ArcadeEngine, LifecyclePhase, RepairPolicy};
pub use error::{CoreError, CoreResult};
pub use events::{EventSink, GameEvent};
pub use running::{LaunchSlot, RunningGames};
pub use settings::ArcadeSettings;

//! # arcade_runner
//!
//! Process launcher for generated games.
//!
//! A game is started as a child process and watched for a short grace
//! period. A game that is still alive when the period ends is considered
//! running; one that exits inside the window is a crash, and its captured
//! stderr is reduced to a diagnostic that can be fed back to the model.
//!
//! # Features
//!
//! - **Grace-period classification**: running vs. failed with diagnostic
//! - **Diagnostic filtering**: framework noise removed, error lines kept
//! - **Graceful stop**: terminate, wait, then force-kill
//! - **Mock Runner**: scripted outcomes for tests without real processes
//!
//! # Example
//!
//! ```rust,no_run
//! use arcade_runner::{GameRunner, LaunchConfig, LaunchOutcome, ProcessRunner};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new(LaunchConfig::default());
//!
//!     match runner.launch(Path::new("/tmp/snake.py")).await? {
//!         LaunchOutcome::Running(mut handle) => {
//!             println!("running as pid {:?}", handle.pid());
//!             handle.stop(Duration::from_secs(5)).await?;
//!         }
//!         LaunchOutcome::Failed(failure) => println!("crashed: {}", failure.diagnostic),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::{Interpreter, LaunchConfig};
pub use diagnostic::DiagnosticFilter;
pub use error::{RunnerError, RunnerResult};
pub use mock::{MockHandle, MockLaunch, MockRunner};
pub use process::{process_alive, terminate_pid, ChildHandle, ProcessRunner};
pub use runner::{GameHandle, GameRunner, LaunchFailure, LaunchOutcome};

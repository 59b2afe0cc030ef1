//! Integration tests for the `arcade` binary.
//!
//! These run the compiled binary against a temporary data directory and an
//! unreachable model server.

use std::process::{Command, Output};
use std::time::Duration;

use tempfile::TempDir;

/// Stand-in game that keeps writing output until it is stopped.
const CHATTY_GAME: &str = "while true; do echo score; echo frame >&2; sleep 0.2; done\n";

struct Sandbox {
    data: TempDir,
    builtin: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            data: TempDir::new().unwrap(),
            builtin: TempDir::new().unwrap(),
        }
    }

    /// Built-in games replaced by `sh` scripts with a short grace period.
    fn with_shell_games() -> Self {
        let sandbox = Self::new();
        std::fs::write(sandbox.data.path().join("settings.json"), r#"{"gracePeriodMs": 300}"#).unwrap();
        for file in ["snake_moving_food.py", "rainbow_space_invaders.py"] {
            std::fs::write(sandbox.builtin.path().join(file), CHATTY_GAME).unwrap();
        }
        sandbox
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_arcade"))
            .args(args)
            .env("ARCADE_DATA_DIR", self.data.path())
            .env("ARCADE_BUILTIN_DIR", self.builtin.path())
            .env("ARCADE_SERVER_URL", "http://127.0.0.1:9")
            .env("ARCADE_PYTHON", "sh")
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }

    fn running(&self, id: &str) -> bool {
        let output = self.run(&["show", id, "--json"]);
        assert!(output.status.success());
        let game: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        game["running"].as_bool().unwrap()
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.data.path().join("active_games.json").exists() {
            for id in ["builtin_snake", "builtin_invaders"] {
                let _ = self.run(&["stop", id]);
            }
        }
    }
}

/// Test that list shows the built-in games as JSON
#[test]
fn test_list_builtins_json() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["list", "--json"]);

    assert!(output.status.success());
    let games: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = games
        .as_array()
        .unwrap()
        .iter()
        .map(|game| game["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"builtin_snake"));
    assert!(ids.contains(&"builtin_invaders"));
}

/// Test that an unknown game id exits with code 2
#[test]
fn test_show_unknown_game() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["show", "nosuchgame"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Game not found"));
}

/// Test that built-in games cannot be deleted
#[test]
fn test_delete_builtin_refused() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["delete", "builtin_snake"]);

    assert_eq!(output.status.code(), Some(2));
}

/// Test that an unreachable server fails generation with code 3 and an SSE error frame
#[test]
fn test_create_without_server() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--format", "sse", "create", "pong"]);

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("data: {\"type\":\"status\",\"message\":\"Connecting to LLM...\"}\n\n"));
    assert!(stdout.contains("\"type\":\"error\""));
}

/// Test that stopping a game that is not running succeeds
#[test]
fn test_stop_not_running() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["stop", "abc12345"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is not running"));
}

/// Test that status reports an offline server
#[test]
fn test_status_offline() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["status", "--json"]);

    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["online"], false);
    assert_eq!(status["models"].as_array().unwrap().len(), 0);
}

/// Test that a second launch is refused while a detached game runs
#[test]
fn test_second_launch_refused_across_invocations() {
    let sandbox = Sandbox::with_shell_games();

    let first = sandbox.run(&["launch", "builtin_snake", "--detach"]);
    assert!(
        first.status.success(),
        "{}",
        String::from_utf8_lossy(&first.stderr)
    );

    let second = sandbox.run(&["--format", "sse", "launch", "builtin_invaders", "--detach"]);
    assert_eq!(second.status.code(), Some(4));
    assert_eq!(
        String::from_utf8_lossy(&second.stdout),
        "data: {\"type\":\"error\",\"message\":\"Another game is already running\"}\n\n"
    );
    assert!(!sandbox.running("builtin_invaders"));

    let stop = sandbox.run(&["stop", "builtin_snake"]);
    assert!(String::from_utf8_lossy(&stop.stdout).contains("Stopped game builtin_snake"));

    let third = sandbox.run(&["launch", "builtin_invaders", "--detach"]);
    assert!(third.status.success());
    assert!(sandbox.running("builtin_invaders"));
}

/// Test that a chatty detached game keeps running after the CLI exits
#[test]
fn test_detached_game_survives_cli_exit() {
    let sandbox = Sandbox::with_shell_games();

    let launch = sandbox.run(&["launch", "builtin_snake", "--detach"]);
    assert!(launch.status.success());

    std::thread::sleep(Duration::from_millis(1500));
    assert!(sandbox.running("builtin_snake"));

    let log = std::fs::read_to_string(
        sandbox.data.path().join("logs").join("snake_moving_food.stdout.log"),
    )
    .unwrap();
    assert!(log.lines().count() > 5);

    sandbox.run(&["stop", "builtin_snake"]);
    std::thread::sleep(Duration::from_millis(300));
    assert!(!sandbox.running("builtin_snake"));
}

/// Test that a game which exited on its own is no longer reported as running
#[test]
fn test_exited_game_not_reported_running() {
    let sandbox = Sandbox::with_shell_games();
    std::fs::write(
        sandbox.builtin.path().join("snake_moving_food.py"),
        "sleep 1\n",
    )
    .unwrap();

    let launch = sandbox.run(&["launch", "builtin_snake", "--detach"]);
    assert!(launch.status.success());
    assert!(sandbox.running("builtin_snake"));

    std::thread::sleep(Duration::from_millis(2000));
    assert!(!sandbox.running("builtin_snake"));

    let stop = sandbox.run(&["stop", "builtin_snake"]);
    assert!(String::from_utf8_lossy(&stop.stdout).contains("is not running"));
}

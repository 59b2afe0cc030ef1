//! Integration tests for the lifecycle engine.
//!
//! The model server and game processes are replaced by the mock
//! completion service and the mock runner.

use std::sync::Arc;

use arcade_core::{ArcadeEngine, Catalog, CoreError, EventSink, GameEvent, BUILTIN_GAMES};
use arcade_llm::{CodeGenerator, MockCompletion, MockReply};
use arcade_runner::{MockLaunch, MockRunner};
use tempfile::TempDir;

const PONG: &str = "import pygame\n\npygame.init()\nrunning = True\nwhile running:\n    pass";
const FIXED: &str = "import pygame\n\npygame.init()\n# fixed\nwhile True:\n    pass";
const REPAIR_STATUS: &str = "Game hit an error, trying to fix it...";
const DEBUG_PROMPT_MARKER: &str = "fixing a pygame game";

struct Harness {
    _dir: TempDir,
    engine: Arc<ArcadeEngine>,
    runner: MockRunner,
    llm: MockCompletion,
}

fn harness(runner: MockRunner, llm: MockCompletion) -> Harness {
    let dir = TempDir::new().unwrap();
    let builtin_dir = dir.path().join("builtin");
    std::fs::create_dir_all(&builtin_dir).unwrap();
    for game in BUILTIN_GAMES {
        std::fs::write(builtin_dir.join(game.file), "import pygame\n").unwrap();
    }

    let catalog = Arc::new(Catalog::load(dir.path().join("games"), builtin_dir));
    let generator = CodeGenerator::new(Arc::new(llm.clone()), "mock-model");
    let engine = Arc::new(ArcadeEngine::new(catalog, Arc::new(runner.clone()), generator));

    Harness {
        _dir: dir,
        engine,
        runner,
        llm,
    }
}

async fn create(h: &Harness, prompt: &str) -> Vec<GameEvent> {
    let (sink, mut rx) = EventSink::channel();
    h.engine.create_game(prompt, &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

async fn launch(h: &Harness, id: &str) -> Vec<GameEvent> {
    let (sink, mut rx) = EventSink::channel();
    h.engine.launch_game(id, &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn statuses(events: &[GameEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::Status { message } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

fn terminal_count(events: &[GameEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

fn completed_id(events: &[GameEvent]) -> String {
    match events.last() {
        Some(GameEvent::Complete { game_id, .. }) => game_id.clone(),
        other => panic!("expected complete event, got {:?}", other),
    }
}

/// Test the pong scenario: create succeeds, then a crashing relaunch is repaired once
#[tokio::test]
async fn test_pong_scenario() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Paddle Duel"),
    );

    let events = create(&h, "pong").await;
    assert!(events.iter().any(|e| matches!(e, GameEvent::Content { .. })));
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(
        statuses(&events),
        vec![
            "Connecting to LLM...",
            "Generating code...",
            "Extracting code...",
            "Creating title...",
            "Launching game...",
        ]
    );

    let id = completed_id(&events);
    let artifact = h.engine.game_metadata(&id).unwrap();
    assert_eq!(artifact.title, "Paddle Duel");
    assert_eq!(artifact.prompt, "pong");
    assert_eq!(h.engine.game_source(&id).unwrap(), PONG);
    assert!(h.engine.game_status(&id));

    // Replace the game with one that always crashes and relaunch it
    assert!(h.engine.stop_game(&id).await);
    h.runner
        .clone()
        .always(MockLaunch::traceback("NameError: name 'paddle' is not defined"));
    h.llm.clone().add_reply(MockReply::code(FIXED));

    let events = launch(&h, &id).await;
    let repair_statuses = statuses(&events)
        .into_iter()
        .filter(|s| *s == REPAIR_STATUS)
        .count();
    assert_eq!(repair_statuses, 1);

    let diagnostic_at = events
        .iter()
        .position(|e| matches!(e, GameEvent::Content { content } if content.contains("NameError: name 'paddle'")))
        .expect("diagnostic should be streamed");
    assert!(diagnostic_at < events.len() - 1);
    assert!(matches!(events.last(), Some(GameEvent::Error { .. })));
    assert_eq!(terminal_count(&events), 1);
}

/// Test that a launch that always fails triggers exactly one debug call
#[tokio::test]
async fn test_bounded_repair() {
    let h = harness(
        MockRunner::new().always(MockLaunch::traceback("TypeError: unsupported operand")),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Broken Game")
            .add_reply(MockReply::code(FIXED))
            .add_reply(MockReply::code(FIXED)),
    );

    let events = create(&h, "a broken game").await;

    assert_eq!(h.llm.streamed_requests_matching(DEBUG_PROMPT_MARKER), 1);
    assert_eq!(h.runner.launch_count(), 2);
    assert_eq!(terminal_count(&events), 1);
    match events.last() {
        Some(GameEvent::Error { message }) => {
            assert!(message.contains("TypeError: unsupported operand"));
        }
        other => panic!("expected error, got {:?}", other),
    }

    let user_game = h
        .engine
        .list_games()
        .into_iter()
        .find(|a| !a.is_builtin)
        .unwrap();
    assert_eq!(h.engine.game_source(&user_game.id).unwrap(), FIXED);
}

/// Test that a successful repair relaunches and completes
#[tokio::test]
async fn test_repair_then_success() {
    let h = harness(
        MockRunner::new()
            .add_launch(MockLaunch::crash(0, ""))
            .add_launch(MockLaunch::Runs),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Quick Quit")
            .add_reply(MockReply::code(FIXED)),
    );

    let events = create(&h, "pong").await;
    let id = completed_id(&events);

    assert_eq!(h.engine.game_source(&id).unwrap(), FIXED);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Content { content } if content.contains("missing a proper game loop")
    )));
    assert!(h.engine.game_status(&id));
}

/// Test that a generation failure ends with an error and no retry
#[tokio::test]
async fn test_generation_failure() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::Rejected(500)),
    );

    let events = create(&h, "pong").await;

    assert_eq!(statuses(&events), vec!["Connecting to LLM..."]);
    assert!(matches!(events.last(), Some(GameEvent::Error { .. })));
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(h.runner.launch_count(), 0);
    assert_eq!(h.llm.stream_count(), 1);
    assert_eq!(h.engine.list_games().len(), BUILTIN_GAMES.len());
}

/// Test that a reply without code is a generation failure
#[tokio::test]
async fn test_reply_without_code() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::text("I'd rather not.")),
    );

    let events = create(&h, "pong").await;
    assert!(matches!(events.last(), Some(GameEvent::Error { .. })));
    assert_eq!(h.runner.launch_count(), 0);
}

/// Test that an empty prompt is rejected
#[tokio::test]
async fn test_empty_prompt() {
    let h = harness(MockRunner::new(), MockCompletion::new());
    let events = create(&h, "   ").await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], GameEvent::Error { .. }));
    assert!(h.llm.requests().is_empty());
}

/// Test that a user launch is refused while another game runs
#[tokio::test]
async fn test_single_flight() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::code(PONG)),
    );

    let id = completed_id(&create(&h, "pong").await);
    assert_eq!(h.runner.launch_count(), 1);

    let events = launch(&h, "builtin_snake").await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        GameEvent::Error { message } => assert!(message.contains("already running")),
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(h.runner.launch_count(), 1);
    assert!(h.engine.game_status(&id));
}

/// Test that built-in games are never repaired
#[tokio::test]
async fn test_builtin_not_repaired() {
    let h = harness(
        MockRunner::new().always(MockLaunch::traceback("ImportError: No module named 'pygame'")),
        MockCompletion::new(),
    );

    let events = launch(&h, "builtin_snake").await;

    assert_eq!(h.llm.stream_count(), 0);
    assert!(!statuses(&events).contains(&REPAIR_STATUS));
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Content { content } if content.contains("LAUNCH FAILED")
    )));
    assert!(matches!(events.last(), Some(GameEvent::Error { .. })));
}

/// Test that stop is idempotent and clears the running map
#[tokio::test]
async fn test_idempotent_stop() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::code(PONG)),
    );

    let id = completed_id(&create(&h, "pong").await);
    assert!(h.engine.stop_game(&id).await);
    assert!(!h.engine.stop_game(&id).await);
    assert!(!h.engine.game_status(&id));
    assert_eq!(h.runner.handles()[0].stop_calls(), 1);

    // Stopping after the process exited on its own
    let events = launch(&h, &id).await;
    assert_eq!(completed_id(&events), id);
    h.runner.handles()[1].exit();
    h.engine.stop_game(&id).await;
    assert!(h.engine.running().is_empty());
    assert!(!h.engine.game_status(&id));
}

/// Test that automatic launches evict a running game
#[tokio::test]
async fn test_create_evicts_running_game() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_reply(MockReply::code(FIXED)),
    );

    let first = completed_id(&create(&h, "pong").await);
    let second = completed_id(&create(&h, "breakout").await);

    assert!(!h.engine.game_status(&first));
    assert!(h.engine.game_status(&second));
    assert_eq!(h.engine.running().len(), 1);
}

/// Test remix naming, prompt and built-in protection
#[tokio::test]
async fn test_remix() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Paddle Duel")
            .add_reply(MockReply::code(FIXED)),
    );

    let original = completed_id(&create(&h, "pong").await);

    let (sink, mut rx) = EventSink::channel();
    h.engine.remix_game(&original, "make the ball purple", &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(statuses(&events).contains(&"Saving remixed game..."));
    assert!(statuses(&events).contains(&"Launching remixed game..."));
    let remix = completed_id(&events);
    assert_ne!(remix, original);

    let artifact = h.engine.game_metadata(&remix).unwrap();
    assert_eq!(artifact.title, "Paddle Duel v2");
    assert_eq!(artifact.prompt, "make the ball purple");
    assert_eq!(h.engine.game_source(&remix).unwrap(), FIXED);

    let (sink, mut rx) = EventSink::channel();
    h.engine.remix_game("builtin_snake", "faster", &sink).await;
    drop(sink);
    assert!(matches!(rx.recv().await, Some(GameEvent::Error { .. })));
}

/// Test delete rules
#[tokio::test]
async fn test_delete() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::code(PONG)),
    );

    assert!(matches!(
        h.engine.delete_game("builtin_snake").await,
        Err(CoreError::BuiltinGame(_))
    ));
    assert!(matches!(
        h.engine.delete_game("missing").await,
        Err(CoreError::GameNotFound(_))
    ));

    let id = completed_id(&create(&h, "pong").await);
    let path = h.engine.game_metadata(&id).unwrap().source_location;
    h.engine.delete_game(&id).await.unwrap();

    assert!(!path.exists());
    assert!(h.engine.game_metadata(&id).is_none());
    assert!(!h.engine.game_status(&id));
}

/// Test that each session kind reports its own success message
#[tokio::test]
async fn test_completion_message_per_session() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Paddle Duel")
            .add_reply(MockReply::code(FIXED)),
    );

    fn message(events: &[GameEvent]) -> String {
        match events.last() {
            Some(GameEvent::Complete { message, .. }) => message.clone(),
            other => panic!("expected complete event, got {:?}", other),
        }
    }

    let created = create(&h, "pong").await;
    assert_eq!(message(&created), "Game 'Paddle Duel' created and launched successfully!");
    let id = completed_id(&created);

    let (sink, mut rx) = EventSink::channel();
    h.engine.remix_game(&id, "two balls", &sink).await;
    drop(sink);
    let mut remixed = Vec::new();
    while let Some(event) = rx.recv().await {
        remixed.push(event);
    }
    assert_eq!(message(&remixed), "Game 'Paddle Duel v2' remixed and launched successfully!");

    h.engine.stop_all().await;
    let launched = launch(&h, &id).await;
    assert_eq!(message(&launched), "Game 'Paddle Duel' launched successfully!");
}

/// Test that an unwritable metadata file leaves a working in-memory catalog
#[tokio::test]
async fn test_unwritable_metadata_keeps_working() {
    let dir = TempDir::new().unwrap();
    let games_dir = dir.path().join("games");
    // A directory where the metadata file should be cannot be replaced by a file
    std::fs::create_dir_all(games_dir.join("metadata.json")).unwrap();

    let catalog = Arc::new(Catalog::load(&games_dir, dir.path().join("builtin")));
    assert!(!catalog.save());

    let llm = MockCompletion::new()
        .add_reply(MockReply::code(PONG))
        .add_title("Paddle Duel");
    let engine = ArcadeEngine::new(
        catalog.clone(),
        Arc::new(MockRunner::new()),
        CodeGenerator::new(Arc::new(llm), "mock-model"),
    );

    let (sink, mut rx) = EventSink::channel();
    engine.create_game("pong", &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let id = completed_id(&events);
    assert_eq!(catalog.get(&id).unwrap().title, "Paddle Duel");
    assert_eq!(engine.game_source(&id).unwrap(), PONG);
    assert!(games_dir.join("metadata.json").is_dir());
}

/// Test that metadata survives a reload
#[tokio::test]
async fn test_catalog_round_trip() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new()
            .add_reply(MockReply::code(PONG))
            .add_title("Paddle Duel"),
    );

    let id = completed_id(&create(&h, "pong").await);
    let before = h.engine.game_metadata(&id).unwrap();

    let catalog = h.engine.catalog();
    let reloaded = Catalog::load(catalog.games_dir(), catalog.builtin_dir());
    assert_eq!(reloaded.get(&id), Some(before));
    assert_eq!(reloaded.len(), catalog.len());
}

/// Test the spawned session API
#[tokio::test]
async fn test_spawned_session() {
    let h = harness(
        MockRunner::new(),
        MockCompletion::new().add_reply(MockReply::code(PONG)),
    );

    let mut rx = h.engine.spawn_create("pong");
    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert!(matches!(last, Some(GameEvent::Complete { .. })));
}

/// Test launching through a real process
#[cfg(unix)]
#[tokio::test]
async fn test_end_to_end_with_process() {
    use arcade_runner::{Interpreter, LaunchConfig, ProcessRunner};
    use std::time::Duration;

    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::load(dir.path().join("games"), dir.path().join("builtin")));
    let llm = MockCompletion::new().add_reply(MockReply::code("# pygame stand-in\nwhile true; do sleep 1; done"));
    let runner = ProcessRunner::new(
        LaunchConfig::new(Interpreter::SH)
            .grace_period(Duration::from_millis(300))
            .stop_timeout(Duration::from_secs(2)),
    );
    let engine = ArcadeEngine::new(
        catalog,
        Arc::new(runner),
        CodeGenerator::new(Arc::new(llm), "mock-model"),
    );

    let (sink, mut rx) = EventSink::channel();
    engine.create_game("a shell loop", &sink).await;
    drop(sink);
    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }

    let id = match last {
        Some(GameEvent::Complete { game_id, .. }) => game_id,
        other => panic!("expected complete, got {:?}", other),
    };
    assert!(engine.game_metadata(&id).unwrap().source_location.exists());
    assert!(engine.game_status(&id));
    assert!(engine.stop_game(&id).await);
    assert!(!engine.game_status(&id));
}

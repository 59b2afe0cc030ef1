//! Game title cleanup and fallback.

use crate::types::{ChatMessage, ChatRequest};

const MAX_TITLE_WORDS: usize = 3;

pub const TITLE_SYSTEM_PROMPT: &str =
    "You are a game title generator. Return only the title, nothing else.";

/// Non-streamed request asking the model for a short title.
pub fn title_request(model: &str, prompt: &str) -> ChatRequest {
    let user = format!(
        "Generate a short game title (2-3 words maximum) for this game concept: \"{}\"\n\n\
         Requirements:\n\
         - EXACTLY 2-3 words only\n\
         - Should be catchy and describe the game\n\
         - No punctuation except spaces\n\
         - Examples: \"Snake Game\", \"Space Shooter\", \"Puzzle Master\", \"Racing Fun\"\n\n\
         Return ONLY the title, nothing else.",
        prompt
    );

    ChatRequest::new(
        model,
        vec![ChatMessage::system(TITLE_SYSTEM_PROMPT), ChatMessage::user(user)],
    )
    .max_tokens(20)
    .temperature(0.3)
}

/// Clean a raw model reply into a title of at most three words.
pub fn clean_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let first_line = trimmed.lines().next().unwrap_or_default();
    let title = first_line
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Title built from the first words of the prompt.
pub fn fallback_title(prompt: &str) -> String {
    let title = prompt
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        "Untitled Game".to_string()
    } else {
        title
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

//! Prompt construction for the three generation modes.

use crate::types::{ChatMessage, ChatRequest};

pub const CREATIVE_TEMPERATURE: f32 = 0.7;
pub const DEBUG_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

const CREATE_SYSTEM_PROMPT: &str = "You are an expert Python game developer. \
Generate a complete, working Python game using pygame based on the user's description.

Rules:
1. Use ONLY the pygame library - no external images, sounds, or files
2. Create everything (graphics, colors, shapes) using pygame's built-in drawing functions
3. Make the game fully playable and fun
4. Include proper game mechanics (win/lose conditions, scoring if appropriate)
5. Use proper pygame event handling and game loop
6. Add comments explaining key parts of the code
7. Make sure the game window closes properly when the user clicks the X button
8. Use reasonable colors and make the game visually appealing with pygame primitives

Generate ONLY the Python code in a single code block. Do not include any explanations outside the code block.";

const REMIX_SYSTEM_PROMPT: &str = "You are an expert Python game developer. \
You will be given the source of an existing pygame game and a remix request.

Rules:
1. Apply the requested changes while keeping the game's working structure intact
2. Keep using ONLY the pygame library - no external images, sounds, or files
3. Keep the main game loop, event handling and clean window close behavior
4. Return the COMPLETE modified program, not a diff or a fragment

Generate ONLY the Python code in a single code block. Do not include any explanations outside the code block.";

const DEBUG_SYSTEM_PROMPT: &str = "You are an expert Python game developer fixing a pygame game \
that crashed on startup. You will be given the game's source and the error it produced.

Rules:
1. Change ONLY what is needed to fix the specific error shown
2. Do not add features, restyle the game or rewrite working code
3. Keep the main game loop and event handling intact
4. Return the COMPLETE corrected program

Generate ONLY the Python code in a single code block. Do not include any explanations outside the code block.";

/// What a generation call should produce.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationMode {
    /// A new game from a description.
    Create { prompt: String },
    /// A variation of an existing game.
    Remix { source: String, instruction: String },
    /// A minimal fix for a crashing game.
    Debug { source: String, diagnostic: String },
}

impl GenerationMode {
    pub fn name(&self) -> &'static str {
        match self {
            GenerationMode::Create { .. } => "create",
            GenerationMode::Remix { .. } => "remix",
            GenerationMode::Debug { .. } => "debug",
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            GenerationMode::Debug { .. } => DEBUG_TEMPERATURE,
            _ => CREATIVE_TEMPERATURE,
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        match self {
            GenerationMode::Create { prompt } => vec![
                ChatMessage::system(CREATE_SYSTEM_PROMPT),
                ChatMessage::user(format!("Create a game: {}", prompt)),
            ],
            GenerationMode::Remix {
                source,
                instruction,
            } => vec![
                ChatMessage::system(REMIX_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Here is the original game:\n\n```python\n{}\n```\n\nRemix request: {}",
                    source, instruction
                )),
            ],
            GenerationMode::Debug { source, diagnostic } => vec![
                ChatMessage::system(DEBUG_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "This game crashed with the following error:\n\n```\n{}\n```\n\n\
                     Here is the code:\n\n```python\n{}\n```\n\nReturn the fixed code.",
                    diagnostic, source
                )),
            ],
        }
    }

    /// Streaming request for this mode.
    pub fn request(&self, model: &str, max_tokens: u32) -> ChatRequest {
        ChatRequest::new(model, self.messages())
            .streaming()
            .max_tokens(max_tokens)
            .temperature(self.temperature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    #[test]
    fn test_create_request() {
        let mode = GenerationMode::Create {
            prompt: "pong".to_string(),
        };
        let request = mode.request("m", DEFAULT_MAX_TOKENS);

        assert!(request.stream);
        assert_eq!(request.temperature, CREATIVE_TEMPERATURE);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[1].content, "Create a game: pong");
    }

    #[test]
    fn test_debug_request_is_near_deterministic() {
        let mode = GenerationMode::Debug {
            source: "import pygame".to_string(),
            diagnostic: "NameError: name 'x' is not defined".to_string(),
        };
        let request = mode.request("m", DEFAULT_MAX_TOKENS);

        assert_eq!(request.temperature, DEBUG_TEMPERATURE);
        assert!(request.messages[1].content.contains("NameError"));
        assert!(request.messages[1].content.contains("import pygame"));
        assert!(request.messages[0].content.contains("ONLY what is needed"));
    }

    #[test]
    fn test_remix_embeds_source() {
        let mode = GenerationMode::Remix {
            source: "import pygame".to_string(),
            instruction: "make it purple".to_string(),
        };
        let user = &mode.messages()[1].content;
        assert!(user.contains("```python\nimport pygame\n```"));
        assert!(user.ends_with("Remix request: make it purple"));
    }
}

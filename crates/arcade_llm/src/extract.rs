//! Fenced code block extraction.

use regex::Regex;
use tracing::debug;

/// Extracts the game source from a free-form model reply.
///
/// Patterns are tried in order: each configured language tag, then an
/// untagged fence. Only the first block per pattern is considered, and it is
/// accepted only if it mentions the framework marker (case-insensitive).
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    patterns: Vec<Regex>,
    marker: String,
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new(&["python", "py"], "pygame")
    }
}

impl CodeExtractor {
    pub fn new(tags: &[&str], marker: &str) -> Self {
        let mut patterns: Vec<Regex> = tags
            .iter()
            .filter_map(|tag| {
                Regex::new(&format!(r"(?s)```{}\s*\n(.*?)\n```", regex::escape(tag))).ok()
            })
            .collect();
        if let Ok(untagged) = Regex::new(r"(?s)```\s*\n(.*?)\n```") {
            patterns.push(untagged);
        }

        Self {
            patterns,
            marker: marker.to_lowercase(),
        }
    }

    /// Returns the extracted code, or `None` when no block qualifies.
    pub fn extract(&self, text: &str) -> Option<String> {
        for pattern in &self.patterns {
            let Some(caps) = pattern.captures(text) else {
                continue;
            };
            let code = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if code.to_lowercase().contains(&self.marker) {
                debug!("Extracted {} bytes of code", code.len());
                return Some(code.to_string());
            }
            debug!("Code block without '{}' marker, trying next pattern", self.marker);
        }

        debug!("No usable code block in {} bytes of output", text.len());
        None
    }
}

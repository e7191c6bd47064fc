//! Text completion behind a provider trait.

pub mod openai;

use serde::Serialize;

use crate::error::Result;
use crate::settings::{COMPLETION_MAX_TOKENS, COMPLETION_TEMPERATURE};

pub use openai::OpenAiCompleter;

/// Generation parameters sent with every completion request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationConfig {
    /// Completion model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum generated tokens.
    pub max_tokens: usize,
}

impl GenerationConfig {
    /// Deterministic settings for `text-{family}-001`.
    pub fn for_family(family: &str) -> Self {
        Self {
            model: format!("text-{family}-001"),
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: COMPLETION_MAX_TOKENS,
        }
    }
}

/// Trait implemented by concrete completion backends.
pub trait CompletionProvider: Send + Sync {
    /// Completes `prompt` and returns the first choice, trimmed.
    fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

/// Strips the spaces and newlines completion models tend to emit around an answer.
pub fn trim_completion(text: &str) -> &str {
    text.trim_matches(|ch| ch == ' ' || ch == '\n')
}

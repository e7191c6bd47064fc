//! OpenAI-compatible completion client.

use serde::{Deserialize, Serialize};

use super::{trim_completion, CompletionProvider, GenerationConfig};
use crate::error::{QaError, Result};
use crate::settings::ApiSettings;
use crate::transport::ApiTransport;

/// Client for the legacy `/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiCompleter {
    transport: ApiTransport,
}

impl OpenAiCompleter {
    /// Builds a completion client.
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        Ok(Self {
            transport: ApiTransport::new(settings)?,
        })
    }
}

impl CompletionProvider for OpenAiCompleter {
    fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let body = CompletionRequest {
            prompt,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            model: &config.model,
        };
        let parsed: CompletionResponse = self.transport.post_json("completions", &body)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QaError::RemoteService("completion response has no choices".into()))?;
        Ok(trim_completion(&choice.text).to_string())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    max_tokens: usize,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

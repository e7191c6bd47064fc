//! Fixed pipeline defaults and the command-line knobs shared across binaries.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::completion::GenerationConfig;
use crate::error::{QaError, Result};
use crate::prompt::ContextBudget;
use crate::tokenizer::TokenCounter;

/// Model family substituted into embedding and completion model names.
pub const MODEL_FAMILY: &str = "curie";
/// OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Token budget for the context block (section text plus separators).
pub const MAX_SECTION_TOKENS: usize = 500;
/// Prefix placed before every selected section.
pub const SEPARATOR: &str = "\n* ";
/// Sections at or below this many tokens are dropped during ingestion.
pub const MIN_SECTION_TOKENS: usize = 40;
/// Completion temperature; zero asks for the most likely continuation.
pub const COMPLETION_TEMPERATURE: f32 = 0.0;
/// Hard cap on generated answer length.
pub const COMPLETION_MAX_TOKENS: usize = 300;
/// Vocabulary used for token accounting.
pub const DEFAULT_TOKENIZER: &str = "gpt2";

/// Connection parameters for the embedding and completion services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiSettings {
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: usize,
}

impl ApiSettings {
    /// Builds settings; `max_retries` counts total attempts and is clamped to at least one.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout,
            max_retries: max_retries.max(1),
        }
    }

    /// Bearer token sent with every request.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// API root, e.g. `https://api.openai.com/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Total attempts per request.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }
}

/// Remote service flags.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// OpenAI API key for embedding and completion calls.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints.
    #[arg(long, env = "ASKDOCS_OPENAI_BASE", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Model family used to derive `text-search-{family}-{doc|query}-001` and `text-{family}-001`.
    #[arg(long, env = "ASKDOCS_MODEL_FAMILY", default_value = MODEL_FAMILY)]
    pub model_family: String,

    /// Completion model override (defaults to `text-{family}-001`).
    #[arg(long, env = "ASKDOCS_COMPLETION_MODEL")]
    pub completion_model: Option<String>,

    /// Seconds before a remote request times out.
    #[arg(long, env = "ASKDOCS_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Total attempts per remote request (1 disables retries).
    #[arg(long, env = "ASKDOCS_OPENAI_MAX_RETRIES", default_value_t = 1)]
    pub max_retries: usize,
}

impl ApiArgs {
    /// Converts the parsed flags into `ApiSettings`, requiring an API key.
    pub fn api_settings(&self) -> Result<ApiSettings> {
        let key = self
            .openai_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| QaError::Input("OPENAI_API_KEY must be set".into()))?;
        Ok(ApiSettings::new(
            key,
            self.openai_base_url.clone(),
            Duration::from_secs(self.openai_timeout_secs.max(1)),
            self.max_retries,
        ))
    }

    /// Completion parameters for the model family. Temperature and length stay fixed.
    pub fn generation_config(&self) -> GenerationConfig {
        let mut config = GenerationConfig::for_family(&self.model_family);
        if let Some(model) = &self.completion_model {
            config.model = model.clone();
        }
        config
    }
}

/// Corpus and context-packing flags.
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// CSV with `title,heading,content,tokens` columns.
    #[arg(long, env = "ASKDOCS_SECTIONS", default_value = "sections.csv")]
    pub sections: PathBuf,

    /// CSV with `title,heading,0,1,..` embedding columns.
    #[arg(long, env = "ASKDOCS_EMBEDDINGS", default_value = "embeddings.csv")]
    pub embeddings: PathBuf,

    /// Path to a tokenizer.json, or a pretrained tokenizer identifier.
    #[arg(long, env = "ASKDOCS_TOKENIZER", default_value = DEFAULT_TOKENIZER)]
    pub tokenizer: String,

    /// Token budget for the context block.
    #[arg(long, env = "ASKDOCS_MAX_CONTEXT_TOKENS", default_value_t = MAX_SECTION_TOKENS)]
    pub max_context_tokens: usize,

    /// Text placed before every selected section in the context block.
    #[arg(long, env = "ASKDOCS_SEPARATOR", default_value = SEPARATOR)]
    pub separator: String,
}

impl CorpusArgs {
    /// Builds the context budget, measuring the separator with `tokenizer`.
    pub fn context_budget(&self, tokenizer: &dyn TokenCounter) -> Result<ContextBudget> {
        ContextBudget::measured(self.max_context_tokens, &self.separator, tokenizer)
    }
}

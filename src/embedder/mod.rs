//! Embedding generation behind a small trait so the pipeline can swap backends.

pub mod openai;

use std::fmt;

use crate::corpus::Embedding;
use crate::error::{QaError, Result};
use crate::tokenizer::normalize_whitespace;

pub use openai::OpenAiEmbedder;

/// Which side of the search a text sits on; selects the model variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EmbeddingRole {
    /// Corpus sections, embedded offline.
    Document,
    /// User questions, embedded per request.
    Query,
}

impl EmbeddingRole {
    /// Short form used inside model names.
    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingRole::Document => "doc",
            EmbeddingRole::Query => "query",
        }
    }

    /// `text-search-{family}-{role}-001`.
    pub fn model_name(self, family: &str) -> String {
        format!("text-search-{}-{}-001", family, self.as_str())
    }
}

impl fmt::Display for EmbeddingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns text into a single embedding vector.
pub trait Embedder: Send + Sync {
    /// Embeds one text for the given role.
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Embedding>;
}

/// Normalizes newlines and rejects text that would embed to nothing.
pub fn prepare_input(text: &str) -> Result<String> {
    let normalized = normalize_whitespace(text);
    if normalized.trim().is_empty() {
        return Err(QaError::Input("cannot embed blank text".into()));
    }
    Ok(normalized)
}

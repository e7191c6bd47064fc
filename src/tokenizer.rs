//! Sub-word token counting used to size sections and the context separator.

use std::path::Path;
use std::sync::Arc;

use tokenizers::Tokenizer;

use crate::error::{QaError, Result};

/// Counts tokens the way the completion service's accounting model does.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`, without special tokens.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Sub-word tokenizer loaded once at startup from a `tokenizer.json` file or a
/// pretrained identifier such as `gpt2`.
#[derive(Clone)]
pub struct PretrainedTokenizer {
    inner: Arc<Tokenizer>,
}

impl PretrainedTokenizer {
    /// Loads from a local file when `source` names one, otherwise from the hub.
    pub fn load(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(QaError::Tokenizer("missing tokenizer source".into()));
        }
        let path = Path::new(source);
        let tokenizer = if path.is_file() {
            Tokenizer::from_file(path).map_err(|err| {
                QaError::Tokenizer(format!("failed to load {}: {err}", path.display()))
            })?
        } else {
            Tokenizer::from_pretrained(source, None).map_err(|err| {
                QaError::Tokenizer(format!("failed to fetch pretrained '{source}': {err}"))
            })?
        };
        tracing::debug!(source, "tokenizer vocabulary loaded");
        Ok(Self::from_tokenizer(tokenizer))
    }

    /// Parses an in-memory `tokenizer.json`.
    pub fn from_json(json: &str) -> Result<Self> {
        let tokenizer = Tokenizer::from_bytes(json.as_bytes())
            .map_err(|err| QaError::Tokenizer(format!("invalid tokenizer json: {err}")))?;
        Ok(Self::from_tokenizer(tokenizer))
    }

    fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self {
            inner: Arc::new(tokenizer),
        }
    }
}

impl TokenCounter for PretrainedTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|err| QaError::Tokenizer(format!("failed to encode text: {err}")))?;
        Ok(encoding.len())
    }
}

/// Replaces newlines with spaces before counting or embedding.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\n', " ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Word-level vocabulary that splits on whitespace and punctuation.
    pub(crate) const WORD_TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "bio": 1, "chem": 2, "requires": 3 },
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn counts_words_and_punctuation() {
        let tokenizer = PretrainedTokenizer::from_json(WORD_TOKENIZER_JSON).expect("tokenizer");
        assert_eq!(tokenizer.count_tokens("bio chem requires X.").unwrap(), 5);
        assert_eq!(tokenizer.count_tokens("").unwrap(), 0);
    }

    #[test]
    fn separator_counts_only_visible_marker() {
        let tokenizer = PretrainedTokenizer::from_json(WORD_TOKENIZER_JSON).expect("tokenizer");
        assert_eq!(tokenizer.count_tokens("\n* ").unwrap(), 1);
    }

    #[test]
    fn blank_source_is_tokenizer_error() {
        let err = PretrainedTokenizer::load("   ").err().expect("blank source rejected");
        assert!(matches!(err, QaError::Tokenizer(_)), "got {err:?}");
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, WORD_TOKENIZER_JSON).expect("write");

        let tokenizer = PretrainedTokenizer::load(path.to_str().unwrap()).expect("load");
        assert_eq!(tokenizer.count_tokens("bio chem").unwrap(), 2);
    }

    #[test]
    fn normalizes_newlines() {
        assert_eq!(normalize_whitespace("a\nb\n"), "a b ");
    }
}

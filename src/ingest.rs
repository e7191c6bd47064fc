//! Offline dataset preparation: token counting, filtering, and document embeddings.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::corpus::{DocumentSection, Embedding, SectionKey};
use crate::embedder::{EmbeddingRole, OpenAiEmbedder};
use crate::error::{QaError, Result};
use crate::settings::MIN_SECTION_TOKENS;
use crate::tokenizer::{normalize_whitespace, TokenCounter};

/// Raw section as it appears in the source dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawSection {
    /// Document title.
    pub title: String,
    /// Section heading.
    pub heading: String,
    /// Section body.
    pub content: String,
}

#[derive(Deserialize)]
struct Dataset {
    data: Vec<RawSection>,
}

/// Reads `{"data": [{"title", "heading", "content"}, ..]}`.
pub fn read_dataset(path: &Path) -> Result<Vec<RawSection>> {
    let file = File::open(path)
        .map_err(|err| QaError::Data(format!("failed to open {}: {err}", path.display())))?;
    let dataset: Dataset = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| QaError::Data(format!("invalid dataset {}: {err}", path.display())))?;
    Ok(dataset.data)
}

/// Attaches a token count, measured on the newline-flattened content.
pub fn count_section_tokens(
    raw: Vec<RawSection>,
    tokenizer: &dyn TokenCounter,
) -> Result<Vec<DocumentSection>> {
    raw.into_iter()
        .map(|section| {
            let tokens = tokenizer.count_tokens(&normalize_whitespace(&section.content))?;
            Ok(DocumentSection::new(
                SectionKey::new(section.title, section.heading),
                section.content,
                tokens,
            ))
        })
        .collect()
}

/// Keeps sections above the minimum size, one per key, in input order.
pub fn prepare_sections(sections: Vec<DocumentSection>) -> Vec<DocumentSection> {
    let mut seen = HashSet::new();
    let before = sections.len();
    let kept: Vec<_> = sections
        .into_iter()
        .filter(|section| section.tokens > MIN_SECTION_TOKENS)
        .filter(|section| seen.insert(section.key.clone()))
        .collect();
    tracing::info!(before, kept = kept.len(), "filtered sections");
    kept
}

/// Embeds every section with the document model, batching requests.
pub fn embed_sections(
    sections: &[DocumentSection],
    embedder: &OpenAiEmbedder,
) -> Result<Vec<(SectionKey, Embedding)>> {
    let mut out = Vec::with_capacity(sections.len());
    for (batch_no, batch) in sections.chunks(embedder.batch_size()).enumerate() {
        let inputs: Vec<&str> = batch.iter().map(|section| section.content.as_str()).collect();
        let vectors = embedder.embed_batch(&inputs, EmbeddingRole::Document)?;
        out.extend(batch.iter().map(|section| section.key.clone()).zip(vectors));
        tracing::debug!(batch_no, embedded = out.len(), "embedded batch");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tests::WORD_TOKENIZER_JSON;
    use crate::tokenizer::PretrainedTokenizer;
    use httpmock::prelude::*;
    use std::time::Duration;

    use crate::settings::ApiSettings;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn reads_dataset_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"data": [{"title": "T", "heading": "H1", "content": "body"}]}"#,
        )
        .expect("write");

        let raw = read_dataset(&path).expect("dataset");
        assert_eq!(
            raw,
            vec![RawSection {
                title: "T".into(),
                heading: "H1".into(),
                content: "body".into(),
            }]
        );
    }

    #[test]
    fn malformed_dataset_is_data_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"rows": []}"#).expect("write");

        assert!(matches!(read_dataset(&path), Err(QaError::Data(_))));
    }

    #[test]
    fn counts_tokens_on_flattened_content() {
        let tokenizer = PretrainedTokenizer::from_json(WORD_TOKENIZER_JSON).expect("tokenizer");
        let raw = vec![RawSection {
            title: "T".into(),
            heading: "H".into(),
            content: "bio\nchem requires".into(),
        }];

        let sections = count_section_tokens(raw, &tokenizer).expect("counted");
        assert_eq!(sections[0].tokens, 3);
        assert_eq!(sections[0].content, "bio\nchem requires");
    }

    #[test]
    fn drops_small_sections_and_later_duplicates() {
        let sections = vec![
            DocumentSection::new(SectionKey::new("T", "small"), words(40), 40),
            DocumentSection::new(SectionKey::new("T", "H1"), words(41), 41),
            DocumentSection::new(SectionKey::new("T", "H1"), "dupe", 90),
            DocumentSection::new(SectionKey::new("T", "H2"), words(60), 60),
        ];

        let kept = prepare_sections(sections);

        let headings: Vec<_> = kept.iter().map(|s| s.key.heading.as_str()).collect();
        assert_eq!(headings, ["H1", "H2"]);
        assert_eq!(kept[0].tokens, 41);
    }

    #[test]
    fn embeds_in_batches_with_document_model() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .json_body_partial(r#"{"model": "text-search-curie-doc-001"}"#);
            then.status(200)
                .body(r#"{"data": [{"index": 0, "embedding": [0.1, 0.2]}, {"index": 1, "embedding": [0.3, 0.4]}]}"#);
        });
        let settings = ApiSettings::new("sk-test", server.base_url(), Duration::from_secs(5), 1);
        let embedder = OpenAiEmbedder::new(&settings, "curie", 2).expect("embedder");
        let sections = vec![
            DocumentSection::new(SectionKey::new("T", "H1"), "one", 50),
            DocumentSection::new(SectionKey::new("T", "H2"), "two", 50),
            DocumentSection::new(SectionKey::new("T", "H3"), "three", 50),
            DocumentSection::new(SectionKey::new("T", "H4"), "four", 50),
        ];

        let embedded = embed_sections(&sections, &embedder).expect("embedded");

        assert_eq!(embedded.len(), 4);
        assert_eq!(embedded[2].0, SectionKey::new("T", "H3"));
        assert_eq!(embedded[2].1, vec![0.1, 0.2]);
        assert_eq!(mock.hits(), 2);
    }
}

//! OpenAI-based embedding client implementation.

use serde::{Deserialize, Serialize};

use super::{prepare_input, Embedder, EmbeddingRole};
use crate::corpus::Embedding;
use crate::error::{QaError, Result};
use crate::settings::ApiSettings;
use crate::transport::ApiTransport;

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    transport: ApiTransport,
    family: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client for a model family such as `curie`.
    pub fn new(settings: &ApiSettings, family: impl Into<String>, batch_size: usize) -> Result<Self> {
        let family = family.into();
        if family.trim().is_empty() {
            return Err(QaError::RemoteService("missing embedding model family".into()));
        }
        Ok(Self {
            transport: ApiTransport::new(settings)?,
            family,
            batch_size: batch_size.max(1),
        })
    }

    /// Maximum batch size configured for this client.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sends a batch of strings and returns one vector per input, in input order.
    pub fn embed_batch(&self, inputs: &[&str], role: EmbeddingRole) -> Result<Vec<Embedding>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.batch_size {
            return Err(QaError::Input(format!(
                "batch of {} exceeds configured max {}",
                inputs.len(),
                self.batch_size
            )));
        }
        let prepared = inputs
            .iter()
            .map(|text| prepare_input(text))
            .collect::<Result<Vec<_>>>()?;
        let model = role.model_name(&self.family);
        let request = EmbeddingRequest {
            model: &model,
            input: &prepared,
        };
        let mut parsed: EmbeddingResponse = self.transport.post_json("embeddings", &request)?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(QaError::RemoteService(format!(
                "embedding service returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        parsed
            .data
            .into_iter()
            .map(|entry| {
                if entry.embedding.is_empty() {
                    Err(QaError::RemoteService("embedding service returned an empty vector".into()))
                } else {
                    Ok(entry.embedding)
                }
            })
            .collect()
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Embedding> {
        let mut embeddings = self.embed_batch(&[text], role)?;
        embeddings
            .pop()
            .ok_or_else(|| QaError::RemoteService("embedding service returned no embedding".into()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn embedder(server: &MockServer) -> OpenAiEmbedder {
        let settings = ApiSettings::new("sk-test", server.base_url(), Duration::from_secs(5), 1);
        OpenAiEmbedder::new(&settings, "curie", 4).expect("embedder")
    }

    #[test]
    fn query_embedding_uses_query_model_and_flattened_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/embeddings").json_body(serde_json::json!({
                "model": "text-search-curie-query-001",
                "input": ["what does bio chem require?"]
            }));
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": [{"index": 0, "embedding": [0.5, -0.25]}]}"#);
        });

        let vector = embedder(&server)
            .embed("what does bio\nchem require?", EmbeddingRole::Query)
            .expect("embedding");

        assert_eq!(vector, vec![0.5, -0.25]);
        mock.assert();
    }

    #[test]
    fn batch_results_reordered_by_index() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).body(
                r#"{"data": [
                    {"index": 1, "embedding": [2.0]},
                    {"index": 0, "embedding": [1.0]}
                ]}"#,
            );
        });

        let vectors = embedder(&server)
            .embed_batch(&["first", "second"], EmbeddingRole::Document)
            .expect("batch");

        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn empty_payload_is_remote_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).body(r#"{"data": []}"#);
        });

        let err = embedder(&server)
            .embed("hello", EmbeddingRole::Query)
            .expect_err("no data");
        assert!(matches!(err, QaError::RemoteService(_)), "got {err:?}");
    }

    #[test]
    fn blank_text_never_reaches_the_service() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).body(r#"{"data": []}"#);
        });

        let err = embedder(&server)
            .embed("  \n ", EmbeddingRole::Query)
            .expect_err("blank");
        assert!(matches!(err, QaError::Input(_)), "got {err:?}");
        assert_eq!(mock.hits(), 0);
    }

    #[test]
    fn oversized_batch_rejected() {
        let server = MockServer::start();
        let err = embedder(&server)
            .embed_batch(&["a", "b", "c", "d", "e"], EmbeddingRole::Document)
            .expect_err("too many");
        assert!(matches!(err, QaError::Input(_)), "got {err:?}");
    }
}

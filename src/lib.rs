#![warn(missing_docs)]
//! Question answering over a small pre-embedded document corpus.
//!
//! A query is embedded, every stored section is scored by dot product, the best
//! sections are packed into a token budget, and the resulting prompt is sent to a
//! completion model.

pub mod completion;
pub mod corpus;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod prompt;
pub mod ranker;
pub mod server;
pub mod settings;
pub mod telemetry;
pub mod tokenizer;
mod transport;

pub use completion::{CompletionProvider, GenerationConfig, OpenAiCompleter};
pub use corpus::{Corpus, DocumentSection, Embedding, SectionKey};
pub use embedder::{Embedder, EmbeddingRole, OpenAiEmbedder};
pub use engine::{Answer, QueryEngine};
pub use error::QaError;
pub use prompt::{build_prompt, AssembledPrompt, ContextBudget};
pub use ranker::{rank, RankedSection};
pub use settings::{ApiArgs, ApiSettings, CorpusArgs};
pub use tokenizer::{PretrainedTokenizer, TokenCounter};

//! Query orchestration: embed, rank, assemble, complete.

use std::sync::Arc;

use anyhow::Context;

use crate::completion::{CompletionProvider, GenerationConfig, OpenAiCompleter};
use crate::corpus::{Corpus, SectionKey};
use crate::embedder::{Embedder, EmbeddingRole, OpenAiEmbedder};
use crate::error::{QaError, Result};
use crate::prompt::{build_prompt, AssembledPrompt, ContextBudget};
use crate::ranker::rank;
use crate::settings::{ApiArgs, CorpusArgs};
use crate::tokenizer::PretrainedTokenizer;

/// Message returned when no usable question was supplied.
pub const MISSING_QUESTION: &str = "No question provided";

/// Completed answer along with the context that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    /// Trimmed completion text.
    pub text: String,
    /// Sections placed into the prompt, best-first.
    pub selected: Vec<SectionKey>,
    /// Prompt sent to the completion model.
    pub prompt: String,
}

/// Answers questions over a read-only corpus. Cheap to share behind an `Arc`.
pub struct QueryEngine {
    corpus: Arc<Corpus>,
    embedder: Box<dyn Embedder>,
    completer: Box<dyn CompletionProvider>,
    budget: ContextBudget,
    generation: GenerationConfig,
}

impl QueryEngine {
    /// Wires the pipeline stages together.
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Box<dyn Embedder>,
        completer: Box<dyn CompletionProvider>,
        budget: ContextBudget,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            corpus,
            embedder,
            completer,
            budget,
            generation,
        }
    }

    /// Loads the tokenizer, corpus, and remote clients described by command-line flags.
    pub fn from_args(api: &ApiArgs, corpus: &CorpusArgs) -> anyhow::Result<Self> {
        let tokenizer = PretrainedTokenizer::load(&corpus.tokenizer)
            .with_context(|| format!("failed to load tokenizer '{}'", corpus.tokenizer))?;
        let budget = corpus.context_budget(&tokenizer)?;
        let loaded = Corpus::load(&corpus.sections, &corpus.embeddings).with_context(|| {
            format!(
                "failed to load corpus from {:?} and {:?}",
                corpus.sections, corpus.embeddings
            )
        })?;
        let settings = api
            .api_settings()
            .context("remote service settings are incomplete")?;
        let embedder = OpenAiEmbedder::new(&settings, api.model_family.clone(), 1)?;
        let completer = OpenAiCompleter::new(&settings)?;
        Ok(Self::new(
            Arc::new(loaded),
            Box::new(embedder),
            Box::new(completer),
            budget,
            api.generation_config(),
        ))
    }

    /// Corpus this engine ranks against.
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Runs every stage up to, but not including, the completion call.
    pub fn construct_prompt(&self, question: &str) -> Result<AssembledPrompt> {
        let question = validate_question(question)?;
        let query_embedding = self.embedder.embed(question, EmbeddingRole::Query)?;
        let ranked = rank(&query_embedding, self.corpus.embeddings())?;
        build_prompt(question, &ranked, self.corpus.sections(), &self.budget)
    }

    /// Answers `question`, propagating the first failure from any stage.
    pub fn answer(&self, question: &str) -> Result<Answer> {
        let prompt = self.construct_prompt(question)?;
        let text = self.completer.complete(&prompt.text, &self.generation)?;
        Ok(Answer {
            text,
            selected: prompt.selected,
            prompt: prompt.text,
        })
    }
}

fn validate_question(question: &str) -> Result<&str> {
    if question.trim().is_empty() {
        return Err(QaError::Input(MISSING_QUESTION.into()));
    }
    Ok(question)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::corpus::{DocumentSection, Embedding};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// Returns canned vectors per exact input text.
    pub(crate) struct FixedEmbedder {
        pub(crate) vectors: HashMap<String, Embedding>,
    }

    impl Embedder for FixedEmbedder {
        fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Embedding> {
            assert_eq!(role, EmbeddingRole::Query);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| QaError::RemoteService(format!("no canned embedding for {text}")))
        }
    }

    /// Records prompts and replies with a fixed answer.
    pub(crate) struct RecordingCompleter {
        pub(crate) reply: String,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl RecordingCompleter {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionProvider for RecordingCompleter {
        fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
            assert_eq!(config.temperature, 0.0);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingCompleter;

    impl CompletionProvider for FailingCompleter {
        fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
            Err(QaError::RemoteService("completion timed out".into()))
        }
    }

    pub(crate) const QUESTION: &str = "What does bio chem require?";

    pub(crate) fn two_section_corpus() -> Corpus {
        let sections = vec![
            DocumentSection::new(SectionKey::new("T", "H1"), "Bio chem requires X.", 50),
            DocumentSection::new(SectionKey::new("T", "H2"), "Physics requires Y.", 50),
        ];
        let mut embeddings = BTreeMap::new();
        embeddings.insert(SectionKey::new("T", "H1"), vec![0.9, 0.1]);
        embeddings.insert(SectionKey::new("T", "H2"), vec![0.2, 0.8]);
        Corpus::from_parts(sections, embeddings).expect("corpus")
    }

    pub(crate) fn fixed_embedder() -> FixedEmbedder {
        FixedEmbedder {
            vectors: HashMap::from([(QUESTION.to_string(), vec![1.0, 0.0])]),
        }
    }

    fn engine(completer: Box<dyn CompletionProvider>, budget: ContextBudget) -> QueryEngine {
        QueryEngine::new(
            Arc::new(two_section_corpus()),
            Box::new(fixed_embedder()),
            completer,
            budget,
            GenerationConfig::for_family("curie"),
        )
    }

    #[test]
    fn answers_with_best_section_first() {
        let engine = engine(
            Box::new(RecordingCompleter::new("You need X.")),
            ContextBudget::new(500, "\n* ", 3),
        );

        let answer = engine.answer(QUESTION).expect("answer");

        assert_eq!(answer.text, "You need X.");
        assert_eq!(
            answer.selected,
            vec![SectionKey::new("T", "H1"), SectionKey::new("T", "H2")]
        );
        let h1 = answer.prompt.find("Bio chem requires X.").expect("H1 in prompt");
        let h2 = answer.prompt.find("Physics requires Y.").expect("H2 in prompt");
        assert!(h1 < h2);
        assert!(answer.prompt.ends_with(&format!("Q: {QUESTION}\n A:")));
    }

    #[test]
    fn tiny_budget_sends_empty_context() {
        let engine = engine(
            Box::new(RecordingCompleter::new("I don't know. :)")),
            ContextBudget::new(10, "\n* ", 3),
        );

        let answer = engine.answer(QUESTION).expect("answer");

        assert!(answer.selected.is_empty());
        assert!(!answer.prompt.contains("requires"));
    }

    #[test]
    fn blank_question_is_input_error() {
        let engine = engine(
            Box::new(RecordingCompleter::new("unused")),
            ContextBudget::new(500, "\n* ", 3),
        );

        let err = engine.answer("   ").expect_err("blank");
        assert!(matches!(err, QaError::Input(ref msg) if msg == MISSING_QUESTION));
    }

    #[test]
    fn completion_failure_propagates_unchanged() {
        let engine = engine(Box::new(FailingCompleter), ContextBudget::new(500, "\n* ", 3));

        let err = engine.answer(QUESTION).expect_err("remote failure");
        assert!(matches!(err, QaError::RemoteService(ref msg) if msg == "completion timed out"));
    }

    #[test]
    fn query_dimension_mismatch_surfaces() {
        let engine = QueryEngine::new(
            Arc::new(two_section_corpus()),
            Box::new(FixedEmbedder {
                vectors: HashMap::from([(QUESTION.to_string(), vec![1.0, 0.0, 0.0])]),
            }),
            Box::new(RecordingCompleter::new("unused")),
            ContextBudget::new(500, "\n* ", 3),
            GenerationConfig::for_family("curie"),
        );

        let err = engine.answer(QUESTION).expect_err("mismatch");
        assert!(matches!(err, QaError::DimensionMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn construct_prompt_skips_completion() {
        let engine = engine(Box::new(FailingCompleter), ContextBudget::new(500, "\n* ", 3));

        let prompt = engine.construct_prompt(QUESTION).expect("prompt");
        assert_eq!(prompt.selected.len(), 2);
    }
}

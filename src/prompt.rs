//! Greedy context packing and prompt rendering.

use std::collections::BTreeMap;

use crate::corpus::{DocumentSection, SectionKey};
use crate::error::{QaError, Result};
use crate::ranker::RankedSection;
use crate::settings::{MAX_SECTION_TOKENS, SEPARATOR};
use crate::tokenizer::{normalize_whitespace, TokenCounter};

/// Instructional header placed before the context block.
pub const PROMPT_HEADER: &str = "Answer the question as truthfully as possible using the provided context, and if the answer is not contained within the text below, say \"I don't know. :)\"\n\nContext:\n";

/// Token allowance for the context block and the separator charged per section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextBudget {
    /// Upper bound on section tokens plus separator tokens.
    pub max_tokens: usize,
    /// Text prefixed to every selected section.
    pub separator: String,
    /// Token length of `separator`.
    pub separator_tokens: usize,
}

impl ContextBudget {
    /// Budget with an explicitly known separator length.
    pub fn new(max_tokens: usize, separator: impl Into<String>, separator_tokens: usize) -> Self {
        Self {
            max_tokens,
            separator: separator.into(),
            separator_tokens,
        }
    }

    /// Budget whose separator length is measured with `tokenizer`.
    pub fn measured(
        max_tokens: usize,
        separator: &str,
        tokenizer: &dyn TokenCounter,
    ) -> Result<Self> {
        let separator_tokens = tokenizer.count_tokens(separator)?;
        Ok(Self::new(max_tokens, separator, separator_tokens))
    }

    /// Default 500-token budget with the `"\n* "` separator.
    pub fn standard(tokenizer: &dyn TokenCounter) -> Result<Self> {
        Self::measured(MAX_SECTION_TOKENS, SEPARATOR, tokenizer)
    }
}

/// Rendered prompt plus which sections made it in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// Full prompt text sent to the completion model.
    pub text: String,
    /// Selected sections, best-first.
    pub selected: Vec<SectionKey>,
    /// Tokens consumed by the selected sections and their separators.
    pub context_tokens: usize,
}

/// Packs the best-ranked sections into `budget` and renders the prompt.
///
/// Packing stops at the first section that would push the running total past the
/// budget; smaller sections further down the ranking are not considered.
pub fn build_prompt(
    question: &str,
    ranked: &[RankedSection],
    sections: &BTreeMap<SectionKey, DocumentSection>,
    budget: &ContextBudget,
) -> Result<AssembledPrompt> {
    let mut context = String::new();
    let mut selected = Vec::new();
    let mut running = 0usize;

    for candidate in ranked {
        tracing::debug!(key = %candidate.key, score = candidate.score, "considering section");
        let section = sections.get(&candidate.key).ok_or_else(|| {
            QaError::Data(format!(
                "ranked section {} has no entry in the section table",
                candidate.key
            ))
        })?;
        let next = section
            .tokens
            .checked_add(budget.separator_tokens)
            .and_then(|cost| running.checked_add(cost))
            .filter(|total| *total <= budget.max_tokens);
        let Some(next) = next else {
            break;
        };
        running = next;
        context.push_str(&budget.separator);
        context.push_str(&normalize_whitespace(&section.content));
        selected.push(candidate.key.clone());
    }

    tracing::info!(
        count = selected.len(),
        context_tokens = running,
        sections = ?selected.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "selected document sections"
    );

    Ok(AssembledPrompt {
        text: render(&context, question),
        selected,
        context_tokens: running,
    })
}

fn render(context: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(PROMPT_HEADER.len() + context.len() + question.len() + 12);
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str(context);
    prompt.push_str("\n\n Q: ");
    prompt.push_str(question);
    prompt.push_str("\n A:");
    prompt
}

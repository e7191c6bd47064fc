//! Exact dot-product ranking over the in-memory corpus.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::corpus::{Embedding, SectionKey};
use crate::error::{QaError, Result};

/// One scored section in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSection {
    /// Dot product against the query embedding.
    pub score: f64,
    /// Section identifier.
    pub key: SectionKey,
}

/// Dot product of two vectors, or `None` when their lengths differ.
///
/// Embeddings are unit-normalized by the service, so this equals cosine similarity.
pub fn vector_similarity(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    Some(x.iter().zip(y).map(|(a, b)| a * b).sum())
}

/// Scores every corpus entry against `query` and orders them best-first.
///
/// Ordering is descending on `(score, key)`: equal scores put the greater key first.
/// Every stored vector must match the query's dimensionality.
pub fn rank(query: &[f64], corpus: &BTreeMap<SectionKey, Embedding>) -> Result<Vec<RankedSection>> {
    let mut ranked = Vec::with_capacity(corpus.len());
    for (key, embedding) in corpus {
        let score =
            vector_similarity(query, embedding).ok_or_else(|| QaError::DimensionMismatch {
                key: key.clone(),
                expected: query.len(),
                actual: embedding.len(),
            })?;
        ranked.push(RankedSection {
            score,
            key: key.clone(),
        });
    }
    ranked.sort_by(compare_desc);
    Ok(ranked)
}

fn compare_desc(a: &RankedSection, b: &RankedSection) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.key.cmp(&a.key))
}

// Exhaustive cosine-similarity search over a loaded knowledge base


use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::knowledge::KnowledgeBase;
use crate::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// Cosine similarity of two vectors
///
/// Mismatched lengths, empty vectors and zero-norm vectors score 0 instead of NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    (dot / denominator).clamp(-1.0, 1.0)
}

/// Rank every chunk against `query` and return the best `top_k`, highest score first
///
/// Equal scores keep chunk order. A query whose dimension differs from the knowledge
/// base's is rejected; an empty knowledge base yields no results.
#[inline]
pub fn search(
    knowledge_base: &KnowledgeBase,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<SearchResult>> {
    let Some(dimension) = knowledge_base.dimension() else {
        return Ok(Vec::new());
    };

    if query.len() != dimension {
        return Err(RagError::DimensionMismatch {
            expected: dimension,
            actual: query.len(),
        });
    }

    let mut scored: Vec<(usize, f32)> = knowledge_base
        .chunks()
        .iter()
        .enumerate()
        .map(|(index, chunk)| (index, cosine_similarity(&chunk.embedding, query)))
        .collect();

    // sort_by is stable, so ties stay in chunk order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let chunks = knowledge_base.chunks();
    let results: Vec<SearchResult> = scored
        .into_iter()
        .take(top_k)
        .map(|(index, score)| SearchResult {
            text: chunks[index].text.clone(),
            score,
        })
        .collect();

    debug!(
        "Searched {} chunks, top score {:?}",
        chunks.len(),
        results.first().map(|r| r.score)
    );
    Ok(results)
}

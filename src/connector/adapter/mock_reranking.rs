//! Lexical term-overlap reranker (§4.10): the reranking backend used when no
//! ONNX cross-encoder is configured, and the fallback the cross-encoder path
//! drops to on model load or inference error.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::application::{RerankCandidate, RerankingService};
use crate::domain::DomainError;

pub struct LexicalReranking;

impl LexicalReranking {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LexicalReranking {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Term-overlap score against the query, boosted by Jaccard similarity
/// between the candidate's tokens and the query's tokens.
fn lexical_score(query_terms: &HashSet<String>, candidate_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() || candidate_terms.is_empty() {
        return 0.0;
    }

    let overlap = query_terms.intersection(candidate_terms).count() as f32;
    let term_overlap = overlap / query_terms.len() as f32;

    let union = query_terms.union(candidate_terms).count() as f32;
    let jaccard = if union > 0.0 { overlap / union } else { 0.0 };

    (0.7 * term_overlap + 0.3 * jaccard).clamp(0.0, 1.0)
}

#[async_trait]
impl RerankingService for LexicalReranking {
    async fn score(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<(String, f32)>, DomainError> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let query_terms = tokenize(query);

        Ok(candidates
            .iter()
            .map(|c| {
                let candidate_terms = tokenize(&c.text);
                (c.content_hash.clone(), lexical_score(&query_terms, &candidate_terms))
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "lexical-term-overlap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scores_are_deterministic() {
        let service = LexicalReranking::new();
        let candidates = vec![RerankCandidate {
            content_hash: "a".into(),
            text: "fn add(a: i32, b: i32) -> i32".into(),
        }];

        let first = service.score("add two numbers", &candidates).await.unwrap();
        let second = service.score("add two numbers", &candidates).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ranks_exact_term_match_above_unrelated_text() {
        let service = LexicalReranking::new();
        let candidates = vec![
            RerankCandidate {
                content_hash: "relevant".into(),
                text: "fn add(a: i32, b: i32) -> i32 { a + b }".into(),
            },
            RerankCandidate {
                content_hash: "unrelated".into(),
                text: "struct Config { path: String }".into(),
            },
        ];

        let scored = service.score("add numbers", &candidates).await.unwrap();
        let relevant = scored.iter().find(|(h, _)| h == "relevant").unwrap().1;
        let unrelated = scored.iter().find(|(h, _)| h == "unrelated").unwrap().1;

        assert!(relevant > unrelated);
    }

    #[tokio::test]
    async fn empty_candidates_returns_empty() {
        let service = LexicalReranking::new();
        let scored = service.score("query", &[]).await.unwrap();
        assert!(scored.is_empty());
    }
}

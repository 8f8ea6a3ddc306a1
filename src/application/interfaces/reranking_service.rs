use async_trait::async_trait;

use crate::domain::DomainError;

/// One reranker candidate: enough to score it against a query without the
/// reranker needing to know about chunks, refs, or search-result envelopes.
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub content_hash: String,
    pub text: String,
}

/// A cross-encoder reranking backend (§4.10). On model load or inference
/// failure the caller falls back to the domain-level lexical/hash-embed
/// reranker rather than failing the search (§7 degrade-gracefully policy).
#[async_trait]
pub trait RerankingService: Send + Sync {
    /// Returns `(content_hash, score)` pairs in the same order as input,
    /// highest score first is NOT guaranteed — callers re-sort.
    async fn score(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<(String, f32)>, DomainError>;

    fn model_name(&self) -> &str;
}

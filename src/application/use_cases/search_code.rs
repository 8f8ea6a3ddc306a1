//! Adaptive retrieval pipeline (§4.10): classify → expand → gather
//! per-source candidates → weigh → fuse → rerank.
//!
//! The three named sources (`vector`, `graph`, `symbol`) are gathered
//! independently here and handed to the domain-level weight computer, fuser,
//! and reranker (`domain::retrieval`) — this use case owns only the
//! source-specific candidate gathering the domain layer can't do itself
//! (it has no storage ports).
//!
//! Grounded in the corpus's multi-signal search use case (embed query, ANN
//! search, optional rerank) — generalized here to the three-source fusion
//! and classifier-driven weighting the spec adds on top of plain vector
//! search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::{AnnIndex, AstGraphRepository, QueryExpander, RerankCandidate, RerankingService, SemanticEmbedder, VectorRepository};
use crate::domain::query_classifier::{classify, Classification, EntityType};
use crate::domain::retrieval::{compute_weights, fuse, rerank_lexical, Candidate, FusedCandidate, RetrievalSource};
use crate::domain::symbol_search::{search_symbols, SearchCandidate, SearchMode};
use crate::domain::{DomainError, GraphSymbolNode, Language};

/// Number of expander variants actually searched against the vector source —
/// bounds embedding cost; the original query is always variant zero.
const MAX_QUERY_VARIANTS: usize = 3;

impl SearchCandidate for GraphSymbolNode {
    fn symbol_name(&self) -> &str {
        &self.name
    }

    fn file_path(&self) -> &str {
        &self.file
    }

    fn start_line(&self) -> u32 {
        0
    }
}

/// One result of the fused, reranked pipeline (§4.10 final ranked list).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub source: RetrievalSource,
    pub id: String,
    pub score: f32,
    pub text: String,
}

impl From<FusedCandidate> for SearchHit {
    fn from(f: FusedCandidate) -> Self {
        Self { source: f.candidate.source, id: f.candidate.id, score: f.fused, text: f.candidate.text }
    }
}

pub struct SearchCodeUseCase {
    embedder: Arc<dyn SemanticEmbedder>,
    vector_repo: Arc<dyn VectorRepository>,
    ann_index: Arc<dyn AnnIndex>,
    ast_graph: Arc<dyn AstGraphRepository>,
    expander: Arc<dyn QueryExpander>,
    reranking_service: Option<Arc<dyn RerankingService>>,
}

impl SearchCodeUseCase {
    pub fn new(
        embedder: Arc<dyn SemanticEmbedder>,
        vector_repo: Arc<dyn VectorRepository>,
        ann_index: Arc<dyn AnnIndex>,
        ast_graph: Arc<dyn AstGraphRepository>,
        expander: Arc<dyn QueryExpander>,
    ) -> Self {
        Self { embedder, vector_repo, ann_index, ast_graph, expander, reranking_service: None }
    }

    pub fn with_reranking(mut self, service: Arc<dyn RerankingService>) -> Self {
        self.reranking_service = Some(service);
        self
    }

    /// Runs the full pipeline and returns the top `limit` hits. `accepted_source`
    /// carries forward a prior query's accepted source for the weight
    /// computer's session-reinforcement boost (§4.10 *Weights*).
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        accepted_source: Option<RetrievalSource>,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let classification = classify(query);
        info!(query, primary = classification.primary.as_str(), "adaptive retrieval");

        let variants = self.expander.expand(query).await?;

        let mut candidates = Vec::new();
        candidates.extend(self.vector_candidates(&variants, limit).await?);
        candidates.extend(self.graph_candidates(query, &classification, limit).await?);
        candidates.extend(self.symbol_candidates(query, limit).await?);
        debug!(candidates = candidates.len(), "gathered candidates across all sources");

        let weights = compute_weights(classification.primary, None, accepted_source);
        let fused = fuse(candidates, &weights);
        let reranked = self.rerank(query, fused).await?;

        Ok(reranked.into_iter().take(limit).map(SearchHit::from).collect())
    }

    async fn vector_candidates(&self, variants: &[String], limit: usize) -> Result<Vec<Candidate>, DomainError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for variant in variants.iter().take(MAX_QUERY_VARIANTS) {
            let embedding = self.embedder.embed_text(variant).await?;
            let hits = self.ann_index.search(&embedding, limit).await?;
            for (content_hash, score) in hits {
                if !seen.insert(content_hash.clone()) {
                    continue;
                }
                let text = self.lookup_chunk_text(&content_hash).await.unwrap_or_default();
                out.push(Candidate { source: RetrievalSource::Vector, id: content_hash, score, text });
            }
        }
        Ok(out)
    }

    /// The ANN index is shared across languages while `VectorRepository`
    /// partitions chunks by language, so a content hash's text is recovered
    /// by trying each partition in turn.
    async fn lookup_chunk_text(&self, content_hash: &str) -> Option<String> {
        for lang in Language::all_supported() {
            if let Ok(Some(chunk)) = self.vector_repo.get_chunk(lang, content_hash).await {
                return Some(chunk.text);
            }
        }
        None
    }

    async fn graph_candidates(&self, query: &str, classification: &Classification, limit: usize) -> Result<Vec<Candidate>, DomainError> {
        let mut out = Vec::new();
        let mut rank = 0usize;

        let symbol_names: Vec<&str> = classification
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Symbol)
            .map(|e| e.value.as_str())
            .collect();

        if symbol_names.is_empty() {
            for row in self.ast_graph.find(query, None, limit).await? {
                out.push(Candidate {
                    source: RetrievalSource::Graph,
                    id: row.ref_id,
                    score: 1.0 / (1.0 + rank as f32),
                    text: format!("{} {}", row.name, row.signature),
                });
                rank += 1;
            }
        } else {
            for name in symbol_names {
                for row in self.ast_graph.callers(name, limit).await? {
                    out.push(Candidate {
                        source: RetrievalSource::Graph,
                        id: row.ref_id,
                        score: 1.0 / (1.0 + rank as f32),
                        text: format!("{} {}", row.name, row.signature),
                    });
                    rank += 1;
                }
            }
        }
        Ok(out)
    }

    async fn symbol_candidates(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, DomainError> {
        let nodes = self.ast_graph.all_symbol_nodes().await?;
        let matches = search_symbols(&nodes, query, SearchMode::Auto);

        Ok(matches
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, node)| Candidate {
                source: RetrievalSource::Symbol,
                id: node.ref_id.clone(),
                score: 1.0 / (1.0 + rank as f32),
                text: format!("{} {}", node.name, node.file),
            })
            .collect())
    }

    /// §4.10 *Reranker*: a configured cross-encoder blends half-and-half with
    /// the fused score; absent one, falls back to the domain-level lexical
    /// reranker (term overlap + cross-source agreement).
    async fn rerank(&self, query: &str, fused: Vec<FusedCandidate>) -> Result<Vec<FusedCandidate>, DomainError> {
        let Some(service) = &self.reranking_service else {
            return Ok(rerank_lexical(query, fused));
        };

        let candidates: Vec<RerankCandidate> = fused
            .iter()
            .map(|f| RerankCandidate { content_hash: f.candidate.id.clone(), text: f.candidate.text.clone() })
            .collect();
        let scores: HashMap<String, f32> = service.score(query, &candidates).await?.into_iter().collect();

        let mut reranked: Vec<FusedCandidate> = fused
            .into_iter()
            .map(|mut f| {
                if let Some(cross_score) = scores.get(&f.candidate.id) {
                    f.fused = 0.5 * f.fused + 0.5 * cross_score;
                }
                f
            })
            .collect();

        reranked.sort_by(|a, b| b.fused.partial_cmp(&a.fused).unwrap_or(std::cmp::Ordering::Equal));
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::hnsw_ann_index::HnswAnnIndex;
    use crate::connector::adapter::in_memory_vector_repository::InMemoryVectorRepository;
    use crate::connector::adapter::mock_embedding::HashEmbedder;
    use crate::connector::adapter::rule_based_query_expander::RuleBasedQueryExpander;
    use crate::connector::adapter::sqlite_ast_graph_repository::SqliteAstGraphRepository;
    use crate::domain::hnsw::HnswParams;
    use crate::domain::quantization::quantize;
    use crate::domain::{AstReference, Chunk, RefRow, Symbol, SymbolKind};

    async fn seeded_use_case() -> SearchCodeUseCase {
        let embedder = Arc::new(HashEmbedder::with_dimensions(64));
        let vector_repo: Arc<dyn VectorRepository> = Arc::new(InMemoryVectorRepository::new());
        let ann_index: Arc<dyn AnnIndex> = Arc::new(HnswAnnIndex::new(HnswParams::clamped(16, 200, 64, 8), 64, 1_000));
        let ast_graph: Arc<dyn AstGraphRepository> = Arc::new(SqliteAstGraphRepository::in_memory().unwrap());
        let expander: Arc<dyn QueryExpander> = Arc::new(RuleBasedQueryExpander::new());

        let symbol = Symbol::new("authenticateUser", SymbolKind::Function, "fn authenticateUser(token: &str)", 10, 20, Language::Rust, "src/auth.rs");
        let text = symbol.signature.clone();
        let embedding = embedder.embed_text(&text).await.unwrap();
        let quantized = quantize(&embedding, 8);
        let chunk = Chunk::new("hash-auth", text, &quantized);
        vector_repo.upsert_chunk(Language::Rust, &chunk).await.unwrap();
        ann_index.insert("hash-auth", &chunk).await.unwrap();

        let row = RefRow::new("ref-auth", "hash-auth", "src/auth.rs", "authenticateUser", SymbolKind::Function, &symbol.signature, 10, 20);
        vector_repo.insert_refs(Language::Rust, &[row]).await.unwrap();
        ast_graph.put("src/auth.rs", Language::Rust, &[symbol], &[] as &[AstReference]).await.unwrap();

        SearchCodeUseCase::new(embedder, vector_repo, ann_index, ast_graph, expander)
    }

    #[tokio::test]
    async fn finds_seeded_symbol_by_name() {
        let use_case = seeded_use_case().await;
        let hits = use_case.search("authenticateUser", 10, None).await.unwrap();
        assert!(hits.iter().any(|h| h.id == "ref-auth" || h.id == "hash-auth"));
    }

    #[tokio::test]
    async fn vector_search_surfaces_semantically_close_text() {
        let use_case = seeded_use_case().await;
        let hits = use_case.search("authenticate a user with a token", 10, None).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn lexical_reranking_applies_without_a_configured_service() {
        let use_case = seeded_use_case().await;
        assert!(use_case.reranking_service.is_none());
        let hits = use_case.search("authenticateUser", 5, None).await.unwrap();
        assert!(!hits.is_empty());
    }
}

//! Weight computer, score fuser, and lexical reranker (§4.10 *Weights*,
//! *Fuser*, *Reranker*).
//!
//! Three named sources feed one ranked list: vector similarity search, AST
//! graph navigation, and symbol-name lookup. The weight computer picks a
//! per-source mixture from the query classifier's `primary`; the fuser
//! min-max normalizes each source's scores independently before applying
//! that mixture so no one source dominates purely by having a wider score
//! range; the reranker nudges the fused order by lexical overlap with the
//! query text and by cross-source agreement between distinct candidates
//! describing the same thing.

use std::collections::HashMap;

use super::query_classifier::QueryPrimary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalSource {
    Vector,
    Graph,
    Symbol,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalSource::Vector => "vector",
            RetrievalSource::Graph => "graph",
            RetrievalSource::Symbol => "symbol",
        }
    }

    pub fn all() -> [RetrievalSource; 3] {
        [RetrievalSource::Vector, RetrievalSource::Graph, RetrievalSource::Symbol]
    }
}

/// One retrieval hit before fusion: `{source, id, score, text}`.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: RetrievalSource,
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// One hit after fusion/reranking: the original candidate plus its fused score.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub candidate: Candidate,
    pub fused: f32,
}

/// Base per-source weight table keyed by classifier primary (§4.10
/// *Weights*, design decision: see DESIGN.md — the spec names the mechanism
/// but not the literal base numbers, so these favor the source a primary is
/// named after while leaving the other two a meaningful floor).
fn base_weights(primary: QueryPrimary) -> HashMap<RetrievalSource, f32> {
    let table: [(RetrievalSource, f32); 3] = match primary {
        QueryPrimary::Semantic => [(RetrievalSource::Vector, 0.6), (RetrievalSource::Graph, 0.2), (RetrievalSource::Symbol, 0.2)],
        QueryPrimary::Structural => [(RetrievalSource::Vector, 0.15), (RetrievalSource::Graph, 0.65), (RetrievalSource::Symbol, 0.2)],
        QueryPrimary::Historical => [(RetrievalSource::Vector, 0.25), (RetrievalSource::Graph, 0.35), (RetrievalSource::Symbol, 0.4)],
        QueryPrimary::Hybrid => [(RetrievalSource::Vector, 1.0 / 3.0), (RetrievalSource::Graph, 1.0 / 3.0), (RetrievalSource::Symbol, 1.0 / 3.0)],
    };
    table.into_iter().collect()
}

/// §4.10 *Weights*: base table per primary, optional per-source `bias`
/// added before normalization, and a flat `+0.05` boost for
/// `accepted_source` (a source whose earlier suggestion the caller accepted
/// — reinforced on the next query in the same session). Always L1-normalized
/// to sum to 1.
pub fn compute_weights(
    primary: QueryPrimary,
    bias: Option<&HashMap<RetrievalSource, f32>>,
    accepted_source: Option<RetrievalSource>,
) -> HashMap<RetrievalSource, f32> {
    let mut weights = base_weights(primary);

    if let Some(bias) = bias {
        for (source, delta) in bias {
            *weights.entry(*source).or_insert(0.0) += delta;
        }
    }
    if let Some(accepted) = accepted_source {
        *weights.entry(accepted).or_insert(0.0) += 0.05;
    }

    for w in weights.values_mut() {
        *w = w.max(0.0);
    }
    let total: f32 = weights.values().sum();
    if total > 0.0 {
        for w in weights.values_mut() {
            *w /= total;
        }
    }
    weights
}

/// §4.10 *Fuser*: per-source min-max normalization, then `fused =
/// w_source · normalized`, sorted `fused desc, score desc`. A source with a
/// single candidate (no range to normalize across) gets `normalized = 1.0`
/// for that candidate rather than dividing by zero.
pub fn fuse(candidates: Vec<Candidate>, weights: &HashMap<RetrievalSource, f32>) -> Vec<FusedCandidate> {
    let mut bounds: HashMap<RetrievalSource, (f32, f32)> = HashMap::new();
    for c in &candidates {
        let entry = bounds.entry(c.source).or_insert((f32::INFINITY, f32::NEG_INFINITY));
        entry.0 = entry.0.min(c.score);
        entry.1 = entry.1.max(c.score);
    }

    let mut fused: Vec<FusedCandidate> = candidates
        .into_iter()
        .map(|c| {
            let (min, max) = bounds[&c.source];
            let normalized = if max > min { (c.score - min) / (max - min) } else { 1.0 };
            let w = weights.get(&c.source).copied().unwrap_or(0.0);
            FusedCandidate { fused: w * normalized, candidate: c }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.candidate.score.partial_cmp(&a.candidate.score).unwrap_or(std::cmp::Ordering::Equal))
    });
    fused
}

fn tokenize(text: &str) -> std::collections::HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn jaccard(a: &std::collections::HashSet<String>, b: &std::collections::HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// §4.10 *Reranker*, lexical mode: `fused += 0.2 · |Q ∩ tokens(text)| / |Q|`,
/// plus a `+0.05` boost when a candidate's text has Jaccard similarity
/// `> 0.2` with another candidate from a *different* source (cross-source
/// agreement that two different retrieval paths found the same thing).
pub fn rerank_lexical(query: &str, mut ranked: Vec<FusedCandidate>) -> Vec<FusedCandidate> {
    let query_tokens = tokenize(query);
    let query_len = query_tokens.len().max(1) as f32;

    let candidate_tokens: Vec<std::collections::HashSet<String>> =
        ranked.iter().map(|f| tokenize(&f.candidate.text)).collect();

    let mut boosts = vec![0.0f32; ranked.len()];
    for i in 0..ranked.len() {
        let overlap = query_tokens.intersection(&candidate_tokens[i]).count() as f32;
        boosts[i] += 0.2 * overlap / query_len;

        for j in 0..ranked.len() {
            if i == j || ranked[i].candidate.source == ranked[j].candidate.source {
                continue;
            }
            if jaccard(&candidate_tokens[i], &candidate_tokens[j]) > 0.2 {
                boosts[i] += 0.05;
                break;
            }
        }
    }

    for (f, boost) in ranked.iter_mut().zip(boosts) {
        f.fused += boost;
    }

    ranked.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.candidate.score.partial_cmp(&a.candidate.score).unwrap_or(std::cmp::Ordering::Equal))
    });
    ranked
}

/// Cross-encoder-unavailable fallback (§4.10 *Reranker*): `sigmoid(sum(embed(q
/// ‖ t)))` over a concatenated query+text hash embedding, used when no ONNX
/// pair-scoring model is configured or inference fails.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuser_scenario_6_graph_wins() {
        let candidates = vec![
            Candidate { source: RetrievalSource::Vector, id: "v1".into(), score: 0.9, text: String::new() },
            Candidate { source: RetrievalSource::Graph, id: "g1".into(), score: 0.4, text: String::new() },
            Candidate { source: RetrievalSource::Symbol, id: "s1".into(), score: 0.7, text: String::new() },
        ];
        let weights: HashMap<RetrievalSource, f32> =
            [(RetrievalSource::Vector, 0.2), (RetrievalSource::Graph, 0.5), (RetrievalSource::Symbol, 0.3)].into_iter().collect();

        let fused = fuse(candidates, &weights);
        assert_eq!(fused[0].candidate.id, "g1");
    }

    #[test]
    fn weights_are_l1_normalized() {
        let weights = compute_weights(QueryPrimary::Semantic, None, None);
        let total: f32 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn accepted_source_boost_increases_its_share() {
        let without = compute_weights(QueryPrimary::Hybrid, None, None);
        let with = compute_weights(QueryPrimary::Hybrid, None, Some(RetrievalSource::Symbol));
        assert!(with[&RetrievalSource::Symbol] > without[&RetrievalSource::Symbol]);
    }

    #[test]
    fn min_max_normalization_handles_single_candidate_per_source() {
        let candidates = vec![Candidate { source: RetrievalSource::Vector, id: "only".into(), score: 0.3, text: String::new() }];
        let weights: HashMap<RetrievalSource, f32> = [(RetrievalSource::Vector, 1.0)].into_iter().collect();
        let fused = fuse(candidates, &weights);
        assert_eq!(fused[0].fused, 1.0);
    }

    #[test]
    fn lexical_rerank_boosts_term_overlap() {
        let ranked = vec![
            FusedCandidate {
                candidate: Candidate { source: RetrievalSource::Vector, id: "a".into(), score: 0.5, text: "parse the config file".into() },
                fused: 0.1,
            },
            FusedCandidate {
                candidate: Candidate { source: RetrievalSource::Graph, id: "b".into(), score: 0.5, text: "unrelated text entirely".into() },
                fused: 0.1,
            },
        ];
        let reranked = rerank_lexical("parse config", ranked);
        assert_eq!(reranked[0].candidate.id, "a");
    }

    #[test]
    fn cross_source_agreement_boosts_both_candidates() {
        let ranked = vec![
            FusedCandidate {
                candidate: Candidate { source: RetrievalSource::Vector, id: "a".into(), score: 0.5, text: "authenticate user session token".into() },
                fused: 0.2,
            },
            FusedCandidate {
                candidate: Candidate { source: RetrievalSource::Symbol, id: "b".into(), score: 0.2, text: "authenticate user session".into() },
                fused: 0.1,
            },
        ];
        let reranked = rerank_lexical("session", ranked);
        let b = reranked.iter().find(|f| f.candidate.id == "b").unwrap();
        assert!(b.fused > 0.1);
    }
}

//! Query classifier (§4.10): lexical scoring over four hint sets plus a
//! file-extension regex, producing `{primary, confidence, entities}`.
//!
//! Grounded in the corpus's keyword-scoring query routers (a handful of hint
//! word lists scored against the input, highest scorer wins) — generalized
//! here to the four-category, extension-aware scheme the spec names.

use regex::Regex;

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPrimary {
    Semantic,
    Structural,
    Historical,
    Hybrid,
}

impl QueryPrimary {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPrimary::Semantic => "semantic",
            QueryPrimary::Structural => "structural",
            QueryPrimary::Historical => "historical",
            QueryPrimary::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Symbol,
    File,
    Keyword,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Symbol => "symbol",
            EntityType::File => "file",
            EntityType::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub entity_type: EntityType,
    pub value: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub primary: QueryPrimary,
    pub confidence: f32,
    pub entities: Vec<Entity>,
}

const SEMANTIC_HINTS: &[&str] = &[
    "similar", "like", "related", "about", "does", "behaves", "example", "pattern", "concept",
];
const STRUCTURAL_HINTS: &[&str] = &[
    "callers", "callees", "calls", "calling", "caller", "callee", "extends", "implements",
    "inherits", "children", "contains", "parent", "subclass", "interface", "chain",
];
const HISTORICAL_HINTS: &[&str] = &[
    "history", "commit", "commits", "evolution", "changed", "change", "blame", "when", "who",
    "revision", "diff", "since",
];
const SYMBOL_HINTS: &[&str] = &["find", "lookup", "symbol", "definition", "declared", "named"];

fn file_extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[\w/.\-]+\.(rs|ts|tsx|js|jsx|py|go|java|c|h|md|yml|yaml)\b").unwrap())
}

/// An identifier-shaped token: camelCase, PascalCase, or snake_case with at
/// least one internal boundary — distinguishes code symbols from plain words.
fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([a-z][a-zA-Z0-9]*[A-Z][a-zA-Z0-9]*|[A-Za-z][a-zA-Z0-9]*_[a-zA-Z0-9_]+)\b").unwrap())
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn score_hints(tokens: &[String], hints: &[&str]) -> u32 {
    tokens.iter().filter(|t| hints.contains(&t.as_str())).count() as u32
}

/// Lexical-hint-set classifier (§4.10 *Classifier*). Scores the query against
/// four hint sets and a file-extension regex; the highest scorer becomes
/// `primary`. A tie (including all-zero) resolves to `hybrid`.
pub fn classify(query: &str) -> Classification {
    let tokens = tokenize(query);
    let has_file_extension = file_extension_regex().is_match(query);

    let semantic_score = score_hints(&tokens, SEMANTIC_HINTS);
    let structural_score = score_hints(&tokens, STRUCTURAL_HINTS) + if has_file_extension { 1 } else { 0 };
    let historical_score = score_hints(&tokens, HISTORICAL_HINTS);
    let symbol_score = score_hints(&tokens, SYMBOL_HINTS);

    let scores = [
        (QueryPrimary::Semantic, semantic_score),
        (QueryPrimary::Structural, structural_score),
        (QueryPrimary::Historical, historical_score),
        // Symbol-flavoured lexical hits still route through the semantic
        // vector/graph/symbol fusion the spec's fuser operates over; they
        // bias confidence rather than contribute a fifth primary category.
    ];

    let max_score = scores.iter().map(|(_, s)| *s).max().unwrap_or(0).max(symbol_score);
    let winners: Vec<QueryPrimary> = scores
        .iter()
        .filter(|(_, s)| *s == max_score && max_score > 0)
        .map(|(p, _)| *p)
        .collect();

    let primary = if winners.len() == 1 {
        winners[0]
    } else {
        QueryPrimary::Hybrid
    };

    let total_tokens = tokens.len().max(1) as f32;
    let hit_count = max_score as f32;
    let confidence = (0.25 + 0.7 * (hit_count / total_tokens)).clamp(0.25, 0.95);

    let mut entities = Vec::new();
    for cap in file_extension_regex().find_iter(query) {
        entities.push(Entity { entity_type: EntityType::File, value: cap.as_str().to_string(), confidence: 0.9 });
    }
    for cap in identifier_regex().find_iter(query) {
        entities.push(Entity { entity_type: EntityType::Symbol, value: cap.as_str().to_string(), confidence: 0.8 });
    }
    for hint_set in [SEMANTIC_HINTS, STRUCTURAL_HINTS, HISTORICAL_HINTS, SYMBOL_HINTS] {
        for token in &tokens {
            if hint_set.contains(&token.as_str()) {
                entities.push(Entity { entity_type: EntityType::Keyword, value: token.clone(), confidence: 0.6 });
            }
        }
    }

    Classification { primary, confidence, entities }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_hints_win_for_caller_queries() {
        let c = classify("callers of authenticateUser");
        assert_eq!(c.primary, QueryPrimary::Structural);
    }

    #[test]
    fn historical_hints_win_with_meaningful_confidence() {
        let c = classify("commit history for parseFile");
        assert_eq!(c.primary, QueryPrimary::Historical);
        assert!(c.confidence > 0.3);
    }

    #[test]
    fn no_hints_resolves_to_hybrid() {
        let c = classify("the quick brown fox");
        assert_eq!(c.primary, QueryPrimary::Hybrid);
    }

    #[test]
    fn confidence_stays_within_spec_bounds() {
        for q in ["callers of x", "commit history", "similar to this", "the fox jumps"] {
            let c = classify(q);
            assert!((0.25..=0.95).contains(&c.confidence));
        }
    }

    #[test]
    fn identifier_like_tokens_surface_as_symbol_entities() {
        let c = classify("callers of authenticateUser");
        assert!(c.entities.iter().any(|e| e.entity_type == EntityType::Symbol && e.value == "authenticateUser"));
    }

    #[test]
    fn file_extension_surfaces_as_file_entity() {
        let c = classify("what changed in src/index.ts");
        assert!(c.entities.iter().any(|e| e.entity_type == EntityType::File));
    }
}

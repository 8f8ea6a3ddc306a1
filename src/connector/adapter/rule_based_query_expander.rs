//! Rule-based query expander (§4.10 *Expander*): no external services or
//! model downloads, just three lookup tables plus classifier-conditioned
//! suffixes, capped at 12 unique expansions.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::application::QueryExpander;
use crate::domain::query_classifier::{classify, QueryPrimary};
use crate::domain::DomainError;

const MAX_EXPANSIONS: usize = 12;

/// Common code-search abbreviations, expanded in place when a token matches
/// exactly (case-insensitive).
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("auth", "authentication"),
    ("authz", "authorization"),
    ("config", "configuration"),
    ("cfg", "configuration"),
    ("impl", "implementation"),
    ("init", "initialize"),
    ("db", "database"),
    ("repo", "repository"),
    ("func", "function"),
    ("fn", "function"),
    ("var", "variable"),
    ("ctx", "context"),
    ("env", "environment"),
    ("util", "utility"),
    ("utils", "utilities"),
    ("async", "asynchronous"),
    ("sync", "synchronous"),
    ("param", "parameter"),
    ("args", "arguments"),
    ("arg", "argument"),
    ("msg", "message"),
    ("err", "error"),
    ("req", "request"),
    ("res", "response"),
    ("resp", "response"),
];

/// Near-synonym pairs: code-search terms that often describe the same
/// concept with different vocabulary.
const SYNONYMS: &[(&str, &str)] = &[
    ("function", "method"),
    ("class", "type"),
    ("invoke", "call"),
    ("invokes", "calls"),
    ("constructor", "initializer"),
    ("subclass", "child"),
    ("parent", "base"),
    ("interface", "trait"),
    ("delete", "remove"),
    ("create", "new"),
    ("fetch", "retrieve"),
];

/// Domain vocabulary: a general word maps to the code-specific concept that
/// usually carries the same meaning in this corpus.
const DOMAIN_VOCAB: &[(&str, &str)] = &[
    ("login", "authenticate"),
    ("signin", "authenticate"),
    ("signup", "register"),
    ("save", "persist"),
    ("load", "deserialize"),
    ("dump", "serialize"),
    ("crash", "panic"),
    ("bug", "defect"),
];

pub struct RuleBasedQueryExpander;

impl Default for RuleBasedQueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBasedQueryExpander {
    pub fn new() -> Self {
        Self
    }

    /// Replace every token matching `table`'s key with its value, returning
    /// `None` when no token matched (so the caller doesn't add a no-op variant).
    fn substitute(query: &str, table: &[(&str, &str)]) -> Option<String> {
        let mut changed = false;
        let replaced: Vec<String> = query
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();
                if let Some((_, expansion)) = table.iter().find(|(k, _)| *k == lower) {
                    changed = true;
                    expansion.to_string()
                } else {
                    word.to_string()
                }
            })
            .collect();

        if changed {
            Some(replaced.join(" "))
        } else {
            None
        }
    }

    fn history_suffixes(query: &str) -> [String; 2] {
        [format!("{query} commit history"), format!("{query} change log")]
    }

    fn structure_suffixes(query: &str) -> [String; 2] {
        [format!("{query} callers"), format!("{query} call graph")]
    }
}

#[async_trait]
impl QueryExpander for RuleBasedQueryExpander {
    async fn expand(&self, query: &str) -> Result<Vec<String>, DomainError> {
        let mut variants = vec![query.to_string()];

        if let Some(v) = Self::substitute(query, ABBREVIATIONS) {
            variants.push(v);
        }
        if let Some(v) = Self::substitute(query, SYNONYMS) {
            variants.push(v);
        }
        if let Some(v) = Self::substitute(query, DOMAIN_VOCAB) {
            variants.push(v);
        }

        let classification = classify(query);
        match classification.primary {
            QueryPrimary::Historical => variants.extend(Self::history_suffixes(query)),
            QueryPrimary::Structural => variants.extend(Self::structure_suffixes(query)),
            QueryPrimary::Semantic | QueryPrimary::Hybrid => {}
        }

        let mut seen = HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants.truncate(MAX_EXPANSIONS);

        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn expand(q: &str) -> Vec<String> {
        RuleBasedQueryExpander::new().expand(q).await.unwrap()
    }

    #[tokio::test]
    async fn original_is_always_first() {
        let q = "auth handler";
        let variants = expand(q).await;
        assert_eq!(variants[0], q);
    }

    #[tokio::test]
    async fn abbreviation_is_expanded() {
        let variants = expand("auth config").await;
        assert!(variants.iter().any(|v| v.contains("authentication") && v.contains("configuration")));
    }

    #[tokio::test]
    async fn synonym_variant_is_added() {
        let variants = expand("function that validates input").await;
        assert!(variants.iter().any(|v| v.contains("method")));
    }

    #[tokio::test]
    async fn historical_queries_get_history_suffixes() {
        let variants = expand("commit history for parseFile").await;
        assert!(variants.iter().any(|v| v.ends_with("commit history")));
        assert!(variants.iter().any(|v| v.ends_with("change log")));
    }

    #[tokio::test]
    async fn structural_queries_get_structure_suffixes() {
        let variants = expand("callers of authenticateUser").await;
        assert!(variants.iter().any(|v| v.ends_with(" callers")));
        assert!(variants.iter().any(|v| v.ends_with("call graph")));
    }

    #[tokio::test]
    async fn semantic_queries_get_no_suffixes() {
        let variants = expand("code similar to retry logic").await;
        assert!(!variants.iter().any(|v| v.ends_with("call graph")));
        assert!(!variants.iter().any(|v| v.ends_with("change log")));
    }

    #[tokio::test]
    async fn expansions_are_capped_and_unique() {
        let variants = expand("auth").await;
        let unique: HashSet<&String> = variants.iter().collect();
        assert_eq!(unique.len(), variants.len());
        assert!(variants.len() <= MAX_EXPANSIONS);
    }

    #[tokio::test]
    async fn unmatched_query_returns_only_original() {
        let variants = expand("xyzzy plugh").await;
        assert_eq!(variants, vec!["xyzzy plugh".to_string()]);
    }
}

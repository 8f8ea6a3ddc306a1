use async_trait::async_trait;

use crate::domain::DomainError;

/// Expands a natural language query into multiple related phrasings to
/// improve retrieval recall across the vector, graph, and symbol sources.
///
/// Each variant is searched independently and their candidates are later
/// min-max normalized and weighted by the adaptive retrieval fuser, so
/// variants that surface complementary results each get their own fair
/// comparison rather than averaging into one blurred query.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Expand a query into multiple variants, capped at a small fixed count.
    ///
    /// The original query is always included as the first element.
    /// Returns at least one element (the original query) even when expansion
    /// produces no useful additional variants.
    async fn expand(&self, query: &str) -> Result<Vec<String>, DomainError>;
}

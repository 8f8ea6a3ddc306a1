//! 360-degree symbol context: callers and callees of a named symbol in one
//! call, with a fuzzy fallback when the exact name isn't declared anywhere.
//!
//! Grounded in the corpus's parallel-fetch-then-combine context use case
//! (join callers/callees, fall back to fuzzy name resolution on a miss),
//! rewired onto `AstGraphRepository` and `symbol_search::search_symbols`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::AstGraphRepository;
use crate::domain::symbol_search::{search_symbols, SearchMode};
use crate::domain::{DomainError, GraphSymbolRow};

/// A single dependency entry shown in the context view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEdge {
    /// The other symbol in the relationship.
    pub symbol: String,
    /// File where the caller/callee symbol is declared.
    pub file_path: String,
    /// 1-based declaration line.
    pub line: u32,
}

/// 360-degree view of a symbol's call-graph relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolContext {
    pub symbol: String,
    /// Who calls this symbol (inbound edges).
    pub callers: Vec<ContextEdge>,
    /// What this symbol calls (outbound edges).
    pub callees: Vec<ContextEdge>,
    pub caller_count: usize,
    pub callee_count: usize,
}

const DEFAULT_LIMIT: usize = 100;
const RESOLVE_CANDIDATES: usize = 10;

/// Use case: return a complete in + out dependency view for a named symbol.
pub struct SymbolContextUseCase {
    ast_graph: Arc<dyn AstGraphRepository>,
}

impl SymbolContextUseCase {
    pub fn new(ast_graph: Arc<dyn AstGraphRepository>) -> Self {
        Self { ast_graph }
    }

    /// Fetches callers and callees for `symbol` in parallel and combines them.
    ///
    /// If no symbol is declared with that exact name, falls back to fuzzy
    /// name resolution over every declared symbol (e.g. a typo or a partial
    /// name still resolves to its nearest match).
    pub async fn get_context(&self, symbol: &str, limit: usize) -> Result<SymbolContext, DomainError> {
        let candidates = self.ast_graph.find(symbol, None, RESOLVE_CANDIDATES).await?;

        let target = match candidates.into_iter().find(|row| row.name == symbol) {
            Some(row) => Some(row),
            None => self.resolve_fuzzy(symbol).await?,
        };

        let Some(target) = target else {
            return Ok(SymbolContext { symbol: symbol.to_string(), callers: vec![], callees: vec![], caller_count: 0, callee_count: 0 });
        };

        let (callers, callees) = tokio::try_join!(
            self.ast_graph.callers(&target.name, limit),
            self.ast_graph.callees(&target.ref_id, limit),
        )?;

        let caller_count = callers.len();
        let callee_count = callees.len();

        Ok(SymbolContext {
            symbol: target.name,
            callers: callers.into_iter().map(Self::to_edge).collect(),
            callees: callees.into_iter().map(Self::to_edge).collect(),
            caller_count,
            callee_count,
        })
    }

    async fn resolve_fuzzy(&self, symbol: &str) -> Result<Option<GraphSymbolRow>, DomainError> {
        let nodes = self.ast_graph.all_symbol_nodes().await?;
        let Some(node) = search_symbols(&nodes, symbol, SearchMode::Fuzzy).into_iter().next() else {
            return Ok(None);
        };
        let rows = self.ast_graph.find(&node.name, None, RESOLVE_CANDIDATES).await?;
        Ok(rows.into_iter().find(|row| row.ref_id == node.ref_id))
    }

    fn to_edge(row: GraphSymbolRow) -> ContextEdge {
        ContextEdge { symbol: row.name, file_path: row.file, line: row.start_line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::sqlite_ast_graph_repository::SqliteAstGraphRepository;
    use crate::domain::{AstReference, Language, RefKind, Symbol, SymbolKind};

    async fn seeded_graph() -> Arc<dyn AstGraphRepository> {
        let repo = SqliteAstGraphRepository::in_memory().unwrap();

        let validate = Symbol::new("validateToken", SymbolKind::Function, "fn validateToken()", 1, 1, Language::Rust, "auth.rs");
        let authenticate = Symbol::new("authenticateUser", SymbolKind::Function, "fn authenticateUser()", 5, 5, Language::Rust, "auth.rs");
        let refs = vec![AstReference::new("validateToken", RefKind::Call, 5, 1, "auth.rs", Language::Rust).with_scope("authenticateUser")];
        repo.put("auth.rs", Language::Rust, &[validate, authenticate], &refs).await.unwrap();

        Arc::new(repo)
    }

    #[tokio::test]
    async fn exact_match_returns_both_directions() {
        let ast_graph = seeded_graph().await;
        let use_case = SymbolContextUseCase::new(ast_graph);

        let context = use_case.get_context("authenticateUser", DEFAULT_LIMIT).await.unwrap();

        assert_eq!(context.callee_count, 1);
        assert_eq!(context.callees[0].symbol, "validateToken");
    }

    #[tokio::test]
    async fn unknown_symbol_yields_empty_context() {
        let ast_graph = seeded_graph().await;
        let use_case = SymbolContextUseCase::new(ast_graph);

        let context = use_case.get_context("totallyUnknownSymbol", DEFAULT_LIMIT).await.unwrap();

        assert_eq!(context.caller_count, 0);
        assert_eq!(context.callee_count, 0);
    }

    #[tokio::test]
    async fn fuzzy_fallback_resolves_a_near_match() {
        let ast_graph = seeded_graph().await;
        let use_case = SymbolContextUseCase::new(ast_graph);

        let context = use_case.get_context("authenticatUser", DEFAULT_LIMIT).await.unwrap();

        assert_eq!(context.symbol, "authenticateUser");
    }
}

//! Blast-radius analysis: BFS outward through the `ast_calls_name` edges
//! (§4.5 *Read surface*) to find every symbol that transitively calls a
//! given symbol, bucketed by hop distance.
//!
//! Grounded in the BFS-with-level-bucketing impact analysis use case already
//! in this codebase, rewired from its own call-graph port onto
//! `AstGraphRepository::callers`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::AstGraphRepository;
use crate::domain::DomainError;

/// A single node in the impact (blast-radius) graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactNode {
    /// The affected symbol name.
    pub symbol: String,
    /// Hop distance from the root symbol (1 = direct caller, 2 = caller of caller, …).
    pub depth: usize,
    /// File where the caller symbol is declared.
    pub file_path: String,
}

/// Full blast-radius report for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub root_symbol: String,
    /// Total number of transitively affected symbols (excluding the root).
    pub total_affected: usize,
    /// Deepest hop level reached that contained at least one result.
    pub max_depth_reached: usize,
    /// Affected symbols grouped by hop depth (index 0 = depth 1 = direct callers).
    pub by_depth: Vec<Vec<ImpactNode>>,
}

/// Use case: BFS outward from a symbol through the call graph to identify
/// every symbol that would be affected if the root symbol changes.
pub struct ImpactAnalysisUseCase {
    ast_graph: Arc<dyn AstGraphRepository>,
}

const DEFAULT_LIMIT_PER_LEVEL: usize = 200;

impl ImpactAnalysisUseCase {
    pub fn new(ast_graph: Arc<dyn AstGraphRepository>) -> Self {
        Self { ast_graph }
    }

    /// Computes blast radius out to `max_depth` hops.
    pub async fn analyze(&self, symbol: &str, max_depth: usize) -> Result<ImpactAnalysis, DomainError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((symbol.to_string(), 0));

        // by_depth[i] holds nodes at depth i+1
        let mut by_depth: Vec<Vec<ImpactNode>> = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let callers = self.ast_graph.callers(&current, DEFAULT_LIMIT_PER_LEVEL).await?;
            if callers.is_empty() {
                continue;
            }

            let next_depth = depth + 1;
            while by_depth.len() < next_depth {
                by_depth.push(Vec::new());
            }

            for row in callers {
                if !visited.insert(row.ref_id.clone()) {
                    continue;
                }

                by_depth[next_depth - 1].push(ImpactNode {
                    symbol: row.name.clone(),
                    depth: next_depth,
                    file_path: row.file.clone(),
                });

                queue.push_back((row.name, next_depth));
            }
        }

        let total_affected = by_depth.iter().map(|d| d.len()).sum();
        let max_depth_reached = by_depth.iter().rposition(|d| !d.is_empty()).map(|i| i + 1).unwrap_or(0);

        Ok(ImpactAnalysis {
            root_symbol: symbol.to_string(),
            total_affected,
            max_depth_reached,
            by_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::sqlite_ast_graph_repository::SqliteAstGraphRepository;
    use crate::domain::{AstReference, Language, RefKind, Symbol, SymbolKind};

    async fn seeded_graph() -> Arc<dyn AstGraphRepository> {
        let repo = SqliteAstGraphRepository::in_memory().unwrap();

        // c() calls b(), b() calls a() — so analyzing "a" should surface b at
        // depth 1 and c at depth 2.
        let a = Symbol::new("a", SymbolKind::Function, "fn a()", 1, 1, Language::Rust, "x.rs");
        let b = Symbol::new("b", SymbolKind::Function, "fn b()", 2, 2, Language::Rust, "x.rs");
        let refs_b = vec![AstReference::new("a", RefKind::Call, 2, 1, "x.rs", Language::Rust).with_scope("b")];
        repo.put("x.rs", Language::Rust, &[a, b.clone()], &refs_b).await.unwrap();

        let c = Symbol::new("c", SymbolKind::Function, "fn c()", 3, 3, Language::Rust, "y.rs");
        let refs_c = vec![AstReference::new("b", RefKind::Call, 3, 1, "y.rs", Language::Rust).with_scope("c")];
        repo.put("y.rs", Language::Rust, &[c], &refs_c).await.unwrap();

        Arc::new(repo)
    }

    #[tokio::test]
    async fn blast_radius_is_bucketed_by_hop_distance() {
        let ast_graph = seeded_graph().await;
        let use_case = ImpactAnalysisUseCase::new(ast_graph);

        let analysis = use_case.analyze("a", 5).await.unwrap();

        assert_eq!(analysis.total_affected, 2);
        assert_eq!(analysis.max_depth_reached, 2);
        assert_eq!(analysis.by_depth[0][0].symbol, "b");
        assert_eq!(analysis.by_depth[1][0].symbol, "c");
    }

    #[tokio::test]
    async fn depth_limit_is_respected() {
        let ast_graph = seeded_graph().await;
        let use_case = ImpactAnalysisUseCase::new(ast_graph);

        let analysis = use_case.analyze("a", 1).await.unwrap();

        assert_eq!(analysis.total_affected, 1);
        assert_eq!(analysis.max_depth_reached, 1);
    }

    #[tokio::test]
    async fn leaf_symbol_has_no_impact() {
        let ast_graph = seeded_graph().await;
        let use_case = ImpactAnalysisUseCase::new(ast_graph);

        let analysis = use_case.analyze("c", 5).await.unwrap();

        assert_eq!(analysis.total_affected, 0);
        assert_eq!(analysis.max_depth_reached, 0);
    }
}

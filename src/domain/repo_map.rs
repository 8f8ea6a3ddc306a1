//! Repo map: PageRank over the symbol graph (§4.12).
//!
//! Builds a directed graph from `ast_contains ∪ ast_calls_name` edges
//! joined to symbols, runs power-iteration PageRank for a configurable
//! number of rounds, then rolls per-symbol rank up to its file. Output is
//! the top-N files, each with its top-M symbols, in descending file score.
//!
//! Grounded in the corpus's `petgraph`-backed graph-algorithm modules
//! (dependency graphs, import graphs scored by centrality) — the edge
//! direction and damping factor follow the classic PageRank formulation the
//! spec names, not a corpus-specific variant.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

const DAMPING: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct SymbolNode {
    pub ref_id: String,
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct SymbolEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct RankedSymbol {
    pub name: String,
    pub ref_id: String,
    pub rank: f64,
}

#[derive(Debug, Clone)]
pub struct RankedFile {
    pub file: String,
    pub score: f64,
    pub top_symbols: Vec<RankedSymbol>,
}

/// PageRank over a symbol graph, rolled up to per-file summaries (§4.12).
pub struct RepoMap {
    iterations: u32,
    max_nodes: usize,
}

impl RepoMap {
    /// `iterations` is clamped to `[1, 20]` per `CodeIntelConfig::pagerank_iterations_clamped`.
    pub fn new(iterations: u32, max_nodes: usize) -> Self {
        Self {
            iterations: iterations.clamp(1, 20),
            max_nodes: max_nodes.max(1),
        }
    }

    /// Computes ranked files with their top symbols.
    ///
    /// `top_files` bounds the number of files returned; `top_symbols_per_file`
    /// bounds the symbols listed under each file.
    pub fn compute(
        &self,
        nodes: &[SymbolNode],
        edges: &[SymbolEdge],
        top_files: usize,
        top_symbols_per_file: usize,
    ) -> Vec<RankedFile> {
        let capped_nodes: Vec<&SymbolNode> = nodes.iter().take(self.max_nodes).collect();
        if capped_nodes.is_empty() {
            return Vec::new();
        }

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut index_by_ref: HashMap<&str, NodeIndex> = HashMap::new();
        let mut index_by_name: HashMap<&str, Vec<NodeIndex>> = HashMap::new();

        for node in &capped_nodes {
            let idx = graph.add_node(node.ref_id.clone());
            index_by_ref.insert(&node.ref_id, idx);
            index_by_name.entry(&node.name).or_default().push(idx);
        }

        for edge in edges {
            let from_idx = index_by_ref.get(edge.from.as_str()).copied();
            // Call edges are name-joined (§4.5 `chain`): a caller id connects
            // to every symbol sharing the callee name.
            let to_candidates: Vec<NodeIndex> = index_by_ref
                .get(edge.to.as_str())
                .copied()
                .into_iter()
                .chain(index_by_name.get(edge.to.as_str()).into_iter().flatten().copied())
                .collect();
            if let Some(from_idx) = from_idx {
                for to_idx in to_candidates {
                    if from_idx != to_idx {
                        graph.add_edge(from_idx, to_idx, ());
                    }
                }
            }
        }

        let ranks = self.page_rank(&graph);

        let mut by_file: HashMap<&str, Vec<(&SymbolNode, f64)>> = HashMap::new();
        for node in &capped_nodes {
            let idx = index_by_ref[node.ref_id.as_str()];
            let rank = ranks[idx.index()];
            by_file.entry(&node.file).or_default().push((node, rank));
        }

        let mut files: Vec<RankedFile> = by_file
            .into_iter()
            .map(|(file, mut symbols)| {
                symbols.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                let score: f64 = symbols.iter().take(top_symbols_per_file).map(|(_, r)| *r).sum();
                let top_symbols = symbols
                    .into_iter()
                    .take(top_symbols_per_file)
                    .map(|(sym, rank)| RankedSymbol {
                        name: sym.name.clone(),
                        ref_id: sym.ref_id.clone(),
                        rank,
                    })
                    .collect();
                RankedFile {
                    file: file.to_string(),
                    score,
                    top_symbols,
                }
            })
            .collect();

        files.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file.cmp(&b.file))
        });
        files.truncate(top_files);
        files
    }

    /// Power-iteration PageRank with uniform teleportation, `DAMPING = 0.85`.
    fn page_rank(&self, graph: &DiGraph<String, ()>) -> Vec<f64> {
        let n = graph.node_count();
        if n == 0 {
            return Vec::new();
        }
        let mut ranks = vec![1.0 / n as f64; n];

        let out_degree: Vec<usize> = graph
            .node_indices()
            .map(|idx| graph.edges(idx).count())
            .collect();

        for _ in 0..self.iterations {
            let mut next = vec![(1.0 - DAMPING) / n as f64; n];
            let dangling_mass: f64 = graph
                .node_indices()
                .filter(|idx| out_degree[idx.index()] == 0)
                .map(|idx| ranks[idx.index()])
                .sum();
            for idx in graph.node_indices() {
                let share = if dangling_mass > 0.0 { DAMPING * dangling_mass / n as f64 } else { 0.0 };
                next[idx.index()] += share;
            }
            for idx in graph.node_indices() {
                let degree = out_degree[idx.index()];
                if degree == 0 {
                    continue;
                }
                let contribution = DAMPING * ranks[idx.index()] / degree as f64;
                for edge in graph.edges(idx) {
                    next[edge.target().index()] += contribution;
                }
            }
            ranks = next;
        }
        ranks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(ref_id: &str, name: &str, file: &str) -> SymbolNode {
        SymbolNode { ref_id: ref_id.into(), name: name.into(), file: file.into() }
    }

    #[test]
    fn hub_symbol_outranks_leaves() {
        let nodes = vec![
            node("r1", "main", "a.rs"),
            node("r2", "helper_one", "b.rs"),
            node("r3", "helper_two", "c.rs"),
        ];
        let edges = vec![
            SymbolEdge { from: "r1".into(), to: "helper_one".into() },
            SymbolEdge { from: "r1".into(), to: "helper_two".into() },
        ];
        let map = RepoMap::new(10, 50_000);
        let ranked = map.compute(&nodes, &edges, 10, 5);
        assert_eq!(ranked.len(), 3);
        // both b.rs and c.rs receive rank from main; a.rs (main itself) has no inbound edges.
        let a_score = ranked.iter().find(|f| f.file == "a.rs").unwrap().score;
        let b_score = ranked.iter().find(|f| f.file == "b.rs").unwrap().score;
        assert!(b_score > a_score);
    }

    #[test]
    fn max_nodes_cap_bounds_work() {
        let nodes: Vec<SymbolNode> = (0..10).map(|i| node(&format!("r{i}"), &format!("s{i}"), "a.rs")).collect();
        let map = RepoMap::new(5, 3);
        let ranked = map.compute(&nodes, &[], 10, 10);
        assert_eq!(ranked[0].top_symbols.len(), 3);
    }

    #[test]
    fn empty_graph_returns_no_files() {
        let map = RepoMap::new(10, 50_000);
        assert!(map.compute(&[], &[], 10, 5).is_empty());
    }

    #[test]
    fn iteration_count_clamped_to_spec_range() {
        assert_eq!(RepoMap::new(0, 10).iterations, 1);
        assert_eq!(RepoMap::new(100, 10).iterations, 20);
    }
}

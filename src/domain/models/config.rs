//! Process-wide configuration record (SPEC_FULL.md §1 ambient stack, §3
//! supplemental additions). Loaded from `.git-ai/config.toml`; every field
//! has a default so a missing file is equivalent to an empty one.

use serde::{Deserialize, Serialize};

use super::ParseFailureFallback;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeIntelConfig {
    pub embedding_dim: u32,
    /// SQ8 bit width, constrained to `[4, 8]` (§4.1).
    pub quantization_bits: u8,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub worker_pool_size: Option<usize>,
    /// Below this file count, the indexer runs single-threaded (§4.8).
    pub parallelism_threshold: usize,
    pub parse_failure_fallback: ParseFailureFallback,
    /// Minimum ref name length considered during `chain` traversal (§4.5).
    pub min_ref_name_len: usize,
    pub pagerank_iterations: u32,
    pub pagerank_max_nodes: usize,
}

impl Default for CodeIntelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            quantization_bits: 8,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
            worker_pool_size: None,
            parallelism_threshold: 50,
            parse_failure_fallback: ParseFailureFallback::LineChunk { max_chars: 2000 },
            min_ref_name_len: 2,
            pagerank_iterations: 10,
            pagerank_max_nodes: 50_000,
        }
    }
}

impl CodeIntelConfig {
    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).max(2) - 1)
            .max(1)
    }

    pub fn hnsw_m_clamped(&self) -> usize {
        self.hnsw_m.max(2)
    }

    pub fn hnsw_ef_construction_clamped(&self) -> usize {
        self.hnsw_ef_construction.max(10)
    }

    pub fn hnsw_ef_search_clamped(&self) -> usize {
        self.hnsw_ef_search.max(10)
    }

    pub fn quantization_bits_clamped(&self) -> u8 {
        self.quantization_bits.clamp(4, 8)
    }

    pub fn pagerank_iterations_clamped(&self) -> u32 {
        self.pagerank_iterations.clamp(1, 20)
    }

    /// Parses a `.git-ai/config.toml` document, falling back to defaults for
    /// any field left unset.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_component_clamps() {
        let cfg = CodeIntelConfig::default();
        assert!((4..=8).contains(&cfg.quantization_bits_clamped()));
        assert!(cfg.hnsw_m_clamped() >= 2);
        assert!(cfg.hnsw_ef_construction_clamped() >= 10);
        assert!(cfg.hnsw_ef_search_clamped() >= 10);
        assert!((1..=20).contains(&cfg.pagerank_iterations_clamped()));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let cfg = CodeIntelConfig::from_toml_str("quantization_bits = 4\n").unwrap();
        assert_eq!(cfg.quantization_bits, 4);
        assert_eq!(cfg.embedding_dim, 384);
    }

    #[test]
    fn worker_pool_size_honors_explicit_override() {
        let mut cfg = CodeIntelConfig::default();
        cfg.worker_pool_size = Some(4);
        assert_eq!(cfg.worker_pool_size(), 4);
    }
}

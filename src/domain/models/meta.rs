//! On-disk index metadata (§6): `.git-ai/meta.json`.
//!
//! Written once per indexing run (full or incremental) so a later operation
//! can refuse to run against an incompatible index (`IndexMissingOrIncompatible`,
//! §7) without re-deriving schema facts from the stores themselves.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const META_VERSION: &str = "2.1";
pub const INDEX_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageCounts {
    pub chunks_added: u64,
    pub refs_added: u64,
}

/// AST-graph-backend status, either a live backend with counts or a
/// degraded record of why it was skipped (§7 `StorageBackendUnavailable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AstGraphStatus {
    Enabled {
        backend: String,
        engine: String,
        #[serde(rename = "dbPath", skip_serializing_if = "Option::is_none")]
        db_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        counts: Option<HashMap<String, u64>>,
    },
    Disabled {
        backend: String,
        enabled: bool,
        #[serde(rename = "skippedReason")]
        skipped_reason: String,
    },
}

impl AstGraphStatus {
    pub fn enabled(engine: impl Into<String>, db_path: Option<String>) -> Self {
        AstGraphStatus::Enabled {
            backend: "cozo".to_string(),
            engine: engine.into(),
            db_path,
            counts: None,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        AstGraphStatus::Disabled {
            backend: "cozo".to_string(),
            enabled: false,
            skipped_reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: String,
    pub index_schema_version: u32,
    pub dim: u32,
    #[serde(rename = "dbDir")]
    pub db_dir: String,
    #[serde(rename = "scanRoot")]
    pub scan_root: String,
    pub languages: Vec<String>,
    #[serde(rename = "byLang")]
    pub by_lang: HashMap<String, LanguageCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(rename = "astGraph")]
    pub ast_graph: AstGraphStatus,
}

impl IndexMeta {
    pub fn new(dim: u32, db_dir: impl Into<String>, scan_root: impl Into<String>, ast_graph: AstGraphStatus) -> Self {
        Self {
            version: META_VERSION.to_string(),
            index_schema_version: INDEX_SCHEMA_VERSION,
            dim,
            db_dir: db_dir.into(),
            scan_root: scan_root.into(),
            languages: Vec::new(),
            by_lang: HashMap::new(),
            commit_hash: None,
            ast_graph,
        }
    }

    pub fn record_language(&mut self, lang: &str, chunks_added: u64, refs_added: u64) {
        if !self.languages.contains(&lang.to_string()) {
            self.languages.push(lang.to_string());
        }
        let entry = self.by_lang.entry(lang.to_string()).or_default();
        entry.chunks_added += chunks_added;
        entry.refs_added += refs_added;
    }

    /// `IndexMissingOrIncompatible` (§7) check: the schema version on disk
    /// must match what this binary writes.
    pub fn is_schema_compatible(&self) -> bool {
        self.index_schema_version == INDEX_SCHEMA_VERSION
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_language_accumulates_counts() {
        let mut meta = IndexMeta::new(384, ".git-ai/lancedb", ".", AstGraphStatus::enabled("sqlite", None));
        meta.record_language("rust", 3, 5);
        meta.record_language("rust", 2, 1);
        assert_eq!(meta.by_lang["rust"].chunks_added, 5);
        assert_eq!(meta.by_lang["rust"].refs_added, 6);
        assert_eq!(meta.languages, vec!["rust".to_string()]);
    }

    #[test]
    fn schema_mismatch_is_detected() {
        let mut meta = IndexMeta::new(384, "db", ".", AstGraphStatus::enabled("sqlite", None));
        assert!(meta.is_schema_compatible());
        meta.index_schema_version = 1;
        assert!(!meta.is_schema_compatible());
    }

    #[test]
    fn round_trips_through_json() {
        let meta = IndexMeta::new(384, "db", ".", AstGraphStatus::disabled("native and wasm backends failed to load"));
        let json = meta.to_json_pretty().unwrap();
        let back = IndexMeta::from_json(&json).unwrap();
        assert_eq!(back.version, meta.version);
    }
}

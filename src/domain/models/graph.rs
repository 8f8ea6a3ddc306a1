//! Read-model rows returned by the AST graph store's query surface (§4.5).

use serde::{Deserialize, Serialize};

use super::{Language, SymbolKind};

/// One `ast_symbol` row joined with enough context to render a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSymbolRow {
    pub ref_id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub language: Language,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    pub container_id: Option<String>,
}

/// One `ast_refs_name`/`ast_calls_name` row: an occurrence of `name` at a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRefRow {
    pub name: String,
    pub kind: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub scope_ref_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainDirection {
    Callers,
    Callees,
}

impl ChainDirection {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "callers" => ChainDirection::Callers,
            "callees" => ChainDirection::Callees,
            _ => return None,
        })
    }
}

/// Result of an opaque `query(script, params)` call: a relational table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One node in the symbol graph fed to `RepoMap::compute` (§4.12): every
/// `ast_symbol` row, regardless of whether it appears in a call edge.
#[derive(Debug, Clone)]
pub struct GraphSymbolNode {
    pub ref_id: String,
    pub name: String,
    pub file: String,
}

/// One `ast_calls_name` edge: caller `ref_id` to callee name.
#[derive(Debug, Clone)]
pub struct GraphCallEdge {
    pub caller_ref_id: String,
    pub callee_name: String,
}

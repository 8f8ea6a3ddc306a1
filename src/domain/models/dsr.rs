//! Deterministic Semantic Record model (§4.9, Glossary).
//!
//! A DSR is the canonical, content-addressed diff of one commit against its
//! first parent: which symbols were added, modified, renamed, or deleted,
//! plus the AST-edge operations implied by those changes. Canonicalization
//! (stable key order, two-space indent, sorted operation lists) lives in the
//! DSR generator use case; this module only defines the shape.

use serde::{Deserialize, Serialize};

use super::SymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsrOperation {
    Add,
    Modify,
    Rename,
    Delete,
}

impl DsrOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DsrOperation::Add => "add",
            DsrOperation::Modify => "modify",
            DsrOperation::Rename => "rename",
            DsrOperation::Delete => "delete",
        }
    }
}

/// A snapshot of one side of a symbol pairing, enough to describe either the
/// "before" or "after" state in an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub container: Option<String>,
    pub signature: String,
    pub content_hash: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// One entry in `affected_symbols`: the operation plus the resulting symbol
/// state and, for modify/rename/delete, the prior state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOperation {
    pub operation: DsrOperation,
    pub symbol: SymbolSnapshot,
    pub previous: Option<SymbolSnapshot>,
}

impl SymbolOperation {
    /// Sort key: `(file, container, kind, name)` — lexicographic tuple order
    /// per §4.9 step 7.
    pub fn sort_key(&self) -> (String, String, &'static str, String) {
        (
            self.symbol.file.clone(),
            self.symbol.container.clone().unwrap_or_default(),
            self.symbol.kind.as_str(),
            self.symbol.name.clone(),
        )
    }
}

/// An AST-edge-level consequence of a symbol operation (containment or
/// heritage edge gained/lost).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstEdgeOperation {
    pub operation: DsrOperation,
    pub relation: String,
    pub parent: String,
    pub child: String,
}

impl AstEdgeOperation {
    /// Sort key: `(relation, parent, child)`.
    pub fn sort_key(&self) -> (String, String, String) {
        (self.relation.clone(), self.parent.clone(), self.child.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticChangeType {
    NoOp,
    Additive,
    Modification,
    Deletion,
    Rename,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterministicSemanticRecord {
    pub commit: String,
    pub parent_commit: Option<String>,
    pub affected_symbols: Vec<SymbolOperation>,
    pub ast_operations: Vec<AstEdgeOperation>,
    pub semantic_change_type: SemanticChangeType,
    pub risk_level: RiskLevel,
}

impl DeterministicSemanticRecord {
    /// §4.9 step 6: derives `semantic_change_type` from the operation set.
    pub fn classify_change_type(ops: &[DsrOperation]) -> SemanticChangeType {
        if ops.is_empty() {
            return SemanticChangeType::NoOp;
        }
        let has = |op: DsrOperation| ops.iter().any(|&o| o == op);
        let kinds_present = [
            DsrOperation::Add,
            DsrOperation::Modify,
            DsrOperation::Rename,
            DsrOperation::Delete,
        ]
        .iter()
        .filter(|&&k| has(k))
        .count();

        if kinds_present > 1 {
            return SemanticChangeType::Mixed;
        }
        if has(DsrOperation::Rename) {
            SemanticChangeType::Rename
        } else if has(DsrOperation::Delete) {
            SemanticChangeType::Deletion
        } else if has(DsrOperation::Modify) {
            SemanticChangeType::Modification
        } else {
            SemanticChangeType::Additive
        }
    }

    /// §4.9 step 6: `delete`/`rename` ⇒ high, any `modify` ⇒ medium, else low.
    pub fn classify_risk(ops: &[DsrOperation]) -> RiskLevel {
        if ops.iter().any(|&o| o == DsrOperation::Delete || o == DsrOperation::Rename) {
            RiskLevel::High
        } else if ops.iter().any(|&o| o == DsrOperation::Modify) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Canonical JSON string: stable key order (serde field order), two-space
    /// indent, trailing newline (§4.9 step 7).
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, serde_json::ser::PrettyFormatter::with_indent(b"  "));
        serde::Serialize::serialize(self, &mut ser)?;
        let mut s = String::from_utf8(buf).expect("json output is valid utf8");
        s.push('\n');
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rename_classifies_as_rename_high_risk() {
        let ops = vec![DsrOperation::Rename];
        assert_eq!(
            DeterministicSemanticRecord::classify_change_type(&ops),
            SemanticChangeType::Rename
        );
        assert_eq!(DeterministicSemanticRecord::classify_risk(&ops), RiskLevel::High);
    }

    #[test]
    fn mixed_operations_classify_as_mixed() {
        let ops = vec![DsrOperation::Add, DsrOperation::Modify];
        assert_eq!(
            DeterministicSemanticRecord::classify_change_type(&ops),
            SemanticChangeType::Mixed
        );
    }

    #[test]
    fn empty_changeset_is_no_op_low_risk() {
        assert_eq!(
            DeterministicSemanticRecord::classify_change_type(&[]),
            SemanticChangeType::NoOp
        );
        assert_eq!(DeterministicSemanticRecord::classify_risk(&[]), RiskLevel::Low);
    }

    #[test]
    fn canonical_json_is_stable_across_serializations() {
        let dsr = DeterministicSemanticRecord {
            commit: "abc123".into(),
            parent_commit: Some("def456".into()),
            affected_symbols: vec![],
            ast_operations: vec![],
            semantic_change_type: SemanticChangeType::NoOp,
            risk_level: RiskLevel::Low,
        };
        let a = dsr.to_canonical_json().unwrap();
        let b = dsr.to_canonical_json().unwrap();
        assert_eq!(a, b);
    }
}

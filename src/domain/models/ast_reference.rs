//! Reference-site model (§3): `AstReference`.
//!
//! Emitted by the parser adapter's expression walk (§4.2): a call yields
//! `call(callee_name)`, `new T(…)` yields `new(T)`, a type identifier in a
//! type position yields `type(T)`. Each is attributed to the narrowest
//! enclosing callable scope, or to the file if there is none (Glossary,
//! *Scope*).

use serde::{Deserialize, Serialize};

use super::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Call,
    New,
    Type,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Call => "call",
            RefKind::New => "new",
            RefKind::Type => "type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "call" => RefKind::Call,
            "new" => RefKind::New,
            "type" => RefKind::Type,
            _ => return None,
        })
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single reference occurrence: `{name, ref_kind, line, column}` plus the
/// scope it was attributed to, carried alongside for AST-edge emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstReference {
    pub name: String,
    pub ref_kind: RefKind,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
    pub file_path: String,
    pub language: Language,
    /// The narrowest enclosing callable symbol's name, or `None` if the
    /// reference is attributed directly to the file.
    pub scope_name: Option<String>,
}

impl AstReference {
    pub fn new(
        name: impl Into<String>,
        ref_kind: RefKind,
        line: u32,
        column: u32,
        file_path: impl Into<String>,
        language: Language,
    ) -> Self {
        Self {
            name: name.into(),
            ref_kind,
            line,
            column,
            file_path: file_path.into(),
            language,
            scope_name: None,
        }
    }

    pub fn with_scope(mut self, scope_name: impl Into<String>) -> Self {
        self.scope_name = Some(scope_name.into());
        self
    }

    pub fn is_call(&self) -> bool {
        self.ref_kind == RefKind::Call
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_falls_back_to_none_meaning_file_level() {
        let r = AstReference::new("println", RefKind::Call, 4, 5, "src/main.rs", Language::Rust);
        assert!(r.scope_name.is_none());
        assert!(r.is_call());
    }

    #[test]
    fn ref_kind_round_trips() {
        for kind in [RefKind::Call, RefKind::New, RefKind::Type] {
            assert_eq!(RefKind::parse(kind.as_str()), Some(kind));
        }
    }
}

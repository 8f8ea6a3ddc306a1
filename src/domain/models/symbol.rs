//! Declared-entity model (§3): `Symbol`.
//!
//! A `Symbol` is what the parser adapter (§4.2) extracts from a declaration
//! header — its kind, signature text, line range, and (for class-like kinds)
//! one level of container and heritage lists. Nesting beyond one level is not
//! modelled on the struct itself; transitive containment lives only in the
//! `ast_contains` edges the indexer writes (§4.5).

use serde::{Deserialize, Serialize};

use super::Language;

/// The ten declaration kinds the parser adapter recognizes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
    Type,
    Variable,
    /// Fallback symbol kind emitted by the parse-failure `text_only`/`line_chunk`
    /// paths (§9 design note): keeps downstream stores typed even when no real
    /// declaration could be recovered.
    Document,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Record => "record",
            SymbolKind::Annotation => "annotation",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "enum" => SymbolKind::Enum,
            "record" => SymbolKind::Record,
            "annotation" => SymbolKind::Annotation,
            "type" => SymbolKind::Type,
            "variable" => SymbolKind::Variable,
            "document" => SymbolKind::Document,
            _ => return None,
        })
    }

    /// Kinds that can legally appear as an `ast_contains` parent other than a
    /// file (§3 invariant: parent is a `file_id` or a `ref_id` of one of
    /// these kinds).
    pub fn can_contain_children(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Enum
                | SymbolKind::Record
                | SymbolKind::Annotation
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared entity: function, class, method, … (§3, Glossary).
///
/// `container` holds only the immediate enclosing class/interface/record,
/// boxed to keep `Symbol` itself `Sized` — the spec is explicit that chains
/// of containers are not modelled on the struct, only through graph edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declaration header up to the first `{` or `;`, trimmed (§4.2).
    pub signature: String,
    /// 1-based, inclusive.
    pub start_line: u32,
    /// 1-based, inclusive.
    pub end_line: u32,
    pub language: Language,
    pub file_path: String,
    pub container: Option<Box<Symbol>>,
    pub extends: Option<Vec<String>>,
    pub implements: Option<Vec<String>>,
}

impl Symbol {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        signature: impl Into<String>,
        start_line: u32,
        end_line: u32,
        language: Language,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            signature: signature.into(),
            start_line,
            end_line,
            language,
            file_path: file_path.into(),
            container: None,
            extends: None,
            implements: None,
        }
    }

    pub fn with_container(mut self, container: Symbol) -> Self {
        self.container = Some(Box::new(container));
        self
    }

    pub fn with_extends(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.extends = Some(names);
        }
        self
    }

    pub fn with_implements(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.implements = Some(names);
        }
        self
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container.as_ref().map(|c| c.name.as_str())
    }

    pub fn qualified_name(&self) -> String {
        match self.container_name() {
            Some(parent) => format!("{}.{}", parent, self.name),
            None => self.name.clone(),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Key used by DSR three-pass matching Pass 1: `(file, container, kind, name, signature)`.
    pub fn exact_key(&self) -> (String, Option<String>, SymbolKind, String, String) {
        (
            self.file_path.clone(),
            self.container_name().map(str::to_owned),
            self.kind,
            self.name.clone(),
            self.signature.clone(),
        )
    }

    /// Key used by DSR Pass 2: `(file, container, kind, name)`.
    pub fn name_key(&self) -> (String, Option<String>, SymbolKind, String) {
        (
            self.file_path.clone(),
            self.container_name().map(str::to_owned),
            self.kind,
            self.name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_includes_container() {
        let container = Symbol::new(
            "UserService",
            SymbolKind::Class,
            "class UserService",
            1,
            20,
            Language::Ts,
            "src/index.ts",
        );
        let method = Symbol::new(
            "getUser",
            SymbolKind::Method,
            "getUser(id)",
            2,
            4,
            Language::Ts,
            "src/index.ts",
        )
        .with_container(container);

        assert_eq!(method.qualified_name(), "UserService.getUser");
    }

    #[test]
    fn symbol_kind_round_trips() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Enum,
            SymbolKind::Record,
            SymbolKind::Annotation,
            SymbolKind::Type,
            SymbolKind::Variable,
            SymbolKind::Document,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn can_contain_children_matches_invariant_set() {
        assert!(SymbolKind::Class.can_contain_children());
        assert!(SymbolKind::Annotation.can_contain_children());
        assert!(!SymbolKind::Function.can_contain_children());
        assert!(!SymbolKind::Document.can_contain_children());
    }
}

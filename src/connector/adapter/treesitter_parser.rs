//! Tree-sitter parser adapter (§4.2): a single recursive top-down walk per
//! file that emits `Symbol`s for declarations and `AstReference`s for
//! call/new/type sites, attributed to the narrowest enclosing container and
//! callable scope.
//!
//! Grounded in the corpus's tree-sitter-based extractor: reuses its grammar
//! table and node-kind vocabulary, but replaces its `Query`/`QueryCursor`
//! flat-capture pass with a direct tree walk so container and scope
//! attribution fall out of the recursion itself rather than a second
//! line-range lookup pass.

use tree_sitter::{Node, Parser, Tree};

use crate::application::ParserService;
use crate::domain::{AstReference, DomainError, Language, RefKind, Symbol, SymbolKind};

pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }
}

impl ParserService for TreeSitterParser {
    fn parse(
        &self,
        language: Language,
        bytes: &[u8],
        file_path: &str,
    ) -> Result<(Vec<Symbol>, Vec<AstReference>), DomainError> {
        let Some(grammar) = ts_grammar(language) else {
            return Err(DomainError::language_not_available(language.as_str()));
        };

        let source = std::str::from_utf8(bytes)
            .map_err(|e| DomainError::parse(format!("{file_path}: not valid UTF-8 ({e})")))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| DomainError::internal(format!("grammar load failed: {e}")))?;

        let tree: Tree = parser
            .parse(source, None)
            .ok_or_else(|| DomainError::parse(format!("{file_path}: tree-sitter produced no tree")))?;

        let mut walker = Walker {
            language,
            file_path,
            source,
            symbols: Vec::new(),
            refs: Vec::new(),
            container_stack: Vec::new(),
            scope_stack: Vec::new(),
        };
        walker.walk(tree.root_node());
        Ok((walker.symbols, walker.refs))
    }

    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }
}

fn ts_grammar(language: Language) -> Option<tree_sitter::Language> {
    Some(match language {
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        // tree-sitter-typescript exposes separate grammars for plain JS-like
        // TSX and TS; a raw `.ts` parses fine under the TSX grammar too, so
        // one grammar covers the whole `Ts` partition (js/jsx/ts/tsx).
        Language::Ts => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Markdown => tree_sitter_md::LANGUAGE.into(),
        Language::Yaml => tree_sitter_yaml::LANGUAGE.into(),
        Language::Unknown => return None,
    })
}

/// One enclosing container: its declared name and the `Symbol` describing it
/// (needed to build a child's `container` field without re-walking).
struct ContainerFrame {
    symbol: Symbol,
}

struct Walker<'a> {
    language: Language,
    file_path: &'a str,
    source: &'a str,
    symbols: Vec<Symbol>,
    refs: Vec<AstReference>,
    container_stack: Vec<ContainerFrame>,
    /// Names of enclosing callables (function/method), narrowest last.
    scope_stack: Vec<String>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, node: Node) {
        if let Some((name, kind)) = self.declaration_at(node) {
            self.emit_declaration(node, name, kind);
            return;
        }
        if let Some(ref_hit) = self.reference_at(node) {
            self.refs.push(ref_hit);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn line(&self, byte: usize) -> u32 {
        (self.source[..byte.min(self.source.len())].matches('\n').count() as u32) + 1
    }

    fn column(&self, node: Node) -> u32 {
        node.start_position().column as u32 + 1
    }

    /// Declaration header up to (but not including) the first top-level `{`
    /// or `;`, trimmed (§4.2).
    fn signature_of(&self, node: Node) -> String {
        let start = node.start_byte();
        let end = node.end_byte().min(self.source.len());
        let text = &self.source[start..end];
        let cut = text.find(['{', ';']).unwrap_or(text.len());
        text[..cut].split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn find_name(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(n).to_string())
    }

    /// Tries to recognize `node` as a symbol declaration for the active
    /// language, returning its name and `SymbolKind`.
    fn declaration_at(&self, node: Node) -> Option<(String, SymbolKind)> {
        let kind = node.kind();
        match self.language {
            Language::Rust => match kind {
                "function_item" => Some((self.find_name(node, "name")?, SymbolKind::Function)),
                "struct_item" => Some((self.find_name(node, "name")?, SymbolKind::Class)),
                "enum_item" => Some((self.find_name(node, "name")?, SymbolKind::Enum)),
                "trait_item" => Some((self.find_name(node, "name")?, SymbolKind::Interface)),
                "impl_item" => {
                    let ty = node.child_by_field_name("type").map(|n| self.text(n).to_string());
                    ty.map(|t| (t, SymbolKind::Class))
                }
                _ => None,
            },
            Language::Python => match kind {
                "function_definition" => {
                    let in_class = self
                        .container_stack
                        .last()
                        .map(|f| f.symbol.kind == SymbolKind::Class)
                        .unwrap_or(false);
                    let k = if in_class { SymbolKind::Method } else { SymbolKind::Function };
                    Some((self.find_name(node, "name")?, k))
                }
                "class_definition" => Some((self.find_name(node, "name")?, SymbolKind::Class)),
                _ => None,
            },
            Language::Ts => match kind {
                "function_declaration" | "generator_function_declaration" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Function))
                }
                "method_definition" | "method_signature" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Method))
                }
                "class_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Class)),
                "interface_declaration" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Interface))
                }
                "enum_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Enum)),
                "type_alias_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Type)),
                _ => None,
            },
            Language::Go => match kind {
                "function_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Function)),
                "method_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Method)),
                "type_spec" => {
                    let name = self.find_name(node, "name")?;
                    let is_interface = node
                        .child_by_field_name("type")
                        .map(|t| t.kind() == "interface_type")
                        .unwrap_or(false);
                    let k = if is_interface { SymbolKind::Interface } else { SymbolKind::Class };
                    Some((name, k))
                }
                _ => None,
            },
            Language::Java => match kind {
                "method_declaration" | "constructor_declaration" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Method))
                }
                "class_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Class)),
                "interface_declaration" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Interface))
                }
                "enum_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Enum)),
                "record_declaration" => Some((self.find_name(node, "name")?, SymbolKind::Record)),
                "annotation_type_declaration" => {
                    Some((self.find_name(node, "name")?, SymbolKind::Annotation))
                }
                _ => None,
            },
            Language::C => match kind {
                "function_definition" => {
                    let declarator = node.child_by_field_name("declarator")?;
                    Some((c_declarator_name(declarator, self.source)?, SymbolKind::Function))
                }
                "struct_specifier" => Some((self.find_name(node, "name")?, SymbolKind::Class)),
                "enum_specifier" => Some((self.find_name(node, "name")?, SymbolKind::Enum)),
                "type_definition" => {
                    let declarator = node.child_by_field_name("declarator")?;
                    Some((c_declarator_name(declarator, self.source)?, SymbolKind::Type))
                }
                _ => None,
            },
            // Markdown/Yaml have no declaration model; a `document` fallback
            // symbol is emitted by the indexer's failure path instead, not here.
            Language::Markdown | Language::Yaml | Language::Unknown => None,
        }
    }

    fn emit_declaration(&mut self, node: Node, name: String, kind: SymbolKind) {
        let signature = self.signature_of(node);
        let start_line = self.line(node.start_byte());
        let end_line = self.line(node.end_byte().saturating_sub(1).max(node.start_byte()));

        let mut symbol = Symbol::new(
            name.clone(),
            kind,
            signature.clone(),
            start_line,
            end_line,
            self.language,
            self.file_path,
        );

        if let Some(frame) = self.container_stack.last() {
            symbol = symbol.with_container(frame.symbol.clone());
        }

        if self.language.supports_heritage() && kind.can_contain_children() {
            let (extends, implements) = parse_heritage(&signature);
            symbol = symbol.with_extends(extends).with_implements(implements);
        }

        self.symbols.push(symbol.clone());

        let pushes_container = kind.can_contain_children();
        let pushes_scope = matches!(kind, SymbolKind::Function | SymbolKind::Method);

        if pushes_container {
            self.container_stack.push(ContainerFrame { symbol });
        }
        if pushes_scope {
            self.scope_stack.push(name);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }

        if pushes_scope {
            self.scope_stack.pop();
        }
        if pushes_container {
            self.container_stack.pop();
        }
    }

    /// Tries to recognize `node` as a call/new/type reference site.
    fn reference_at(&self, node: Node) -> Option<AstReference> {
        let kind = node.kind();
        let (name, ref_kind) = match self.language {
            Language::Rust => match kind {
                "call_expression" => {
                    let func = node.child_by_field_name("function")?;
                    (last_segment(self.text(func)), RefKind::Call)
                }
                "struct_expression" => {
                    let ty = node.child_by_field_name("name")?;
                    (last_segment(self.text(ty)), RefKind::New)
                }
                "type_identifier" => (self.text(node).to_string(), RefKind::Type),
                _ => return None,
            },
            Language::Python => match kind {
                "call" => {
                    let func = node.child_by_field_name("function")?;
                    (last_segment(self.text(func)), RefKind::Call)
                }
                _ => return None,
            },
            Language::Ts => match kind {
                "call_expression" => {
                    let func = node.child_by_field_name("function")?;
                    (last_segment(self.text(func)), RefKind::Call)
                }
                "new_expression" => {
                    let ctor = node.child_by_field_name("constructor")?;
                    (last_segment(self.text(ctor)), RefKind::New)
                }
                "type_identifier" => (self.text(node).to_string(), RefKind::Type),
                _ => return None,
            },
            Language::Go => match kind {
                "call_expression" => {
                    let func = node.child_by_field_name("function")?;
                    (last_segment(self.text(func)), RefKind::Call)
                }
                "type_identifier" => (self.text(node).to_string(), RefKind::Type),
                _ => return None,
            },
            Language::Java => match kind {
                "method_invocation" => {
                    let name = self.find_name(node, "name")?;
                    (name, RefKind::Call)
                }
                "object_creation_expression" => {
                    let ty = node.child_by_field_name("type")?;
                    (last_segment(self.text(ty)), RefKind::New)
                }
                "type_identifier" => (self.text(node).to_string(), RefKind::Type),
                _ => return None,
            },
            Language::C => match kind {
                "call_expression" => {
                    let func = node.child_by_field_name("function")?;
                    (self.text(func).to_string(), RefKind::Call)
                }
                "type_identifier" => (self.text(node).to_string(), RefKind::Type),
                _ => return None,
            },
            Language::Markdown | Language::Yaml | Language::Unknown => return None,
        };

        if name.is_empty() {
            return None;
        }

        let mut reference = AstReference::new(
            name,
            ref_kind,
            self.line(node.start_byte()),
            self.column(node),
            self.file_path,
            self.language,
        );
        if let Some(scope) = self.scope_stack.last() {
            reference = reference.with_scope(scope.clone());
        }
        Some(reference)
    }
}

fn last_segment(path_expr: &str) -> String {
    path_expr
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(path_expr)
        .trim()
        .to_string()
}

fn c_declarator_name<'a>(mut declarator: Node<'a>, source: &'a str) -> Option<String> {
    // unwrap pointer/function declarator layers down to the identifier.
    loop {
        match declarator.kind() {
            "identifier" | "field_identifier" => {
                return declarator.utf8_text(source.as_bytes()).ok().map(str::to_string)
            }
            _ => {
                let next = declarator
                    .child_by_field_name("declarator")
                    .or_else(|| declarator.child_by_field_name("name"));
                declarator = next?;
            }
        }
    }
}

/// Parses `extends`/`implements` clauses out of a declaration header string
/// (Java/TypeScript only, §4.2). Comma splitting tracks `<>` nesting depth so
/// generic type arguments aren't mistaken for clause separators.
fn parse_heritage(signature: &str) -> (Vec<String>, Vec<String>) {
    let mut extends = Vec::new();
    let mut implements = Vec::new();

    if let Some(rest) = find_clause(signature, "implements") {
        let (before_implements, _) = rest;
        implements = split_depth_aware(before_implements);
    }

    let extends_clause = extract_clause_text(signature, "extends", &["implements"]);
    if let Some(text) = extends_clause {
        extends = split_depth_aware(&text);
    }

    (extends, implements)
}

fn find_clause<'a>(signature: &'a str, keyword: &str) -> Option<(&'a str, usize)> {
    let idx = find_keyword(signature, keyword)?;
    let rest = &signature[idx + keyword.len()..];
    Some((rest, idx))
}

fn extract_clause_text(signature: &str, keyword: &str, stop_keywords: &[&str]) -> Option<String> {
    let idx = find_keyword(signature, keyword)?;
    let rest = &signature[idx + keyword.len()..];
    let mut end = rest.len();
    for stop in stop_keywords {
        if let Some(stop_idx) = find_keyword(rest, stop) {
            end = end.min(stop_idx);
        }
    }
    Some(rest[..end].to_string())
}

fn find_keyword(haystack: &str, keyword: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let klen = keyword.len();
    let mut i = 0;
    while i + klen <= bytes.len() {
        if &haystack[i..i + klen] == keyword {
            let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
            let after_ok = i + klen == bytes.len() || !bytes[i + klen].is_ascii_alphanumeric();
            if before_ok && after_ok {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn split_depth_aware(s: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth: i32 = 0;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth <= 0 => {
                let name = current.trim().split(['<', ' ']).next().unwrap_or("").trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                current.clear();
            }
            '{' => break,
            _ => current.push(c),
        }
    }
    let name = current.trim().split(['<', ' ']).next().unwrap_or("").trim();
    if !name.is_empty() {
        names.push(name.to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TreeSitterParser {
        TreeSitterParser::new()
    }

    #[test]
    fn supports_all_eight_languages() {
        let p = parser();
        assert_eq!(p.supported_languages().len(), 8);
        assert!(p.supports_language(Language::Rust));
        assert!(!p.supports_language(Language::Unknown));
    }

    #[test]
    fn rust_function_and_call_are_extracted() {
        let src = b"fn helper() {}\nfn main() {\n    helper();\n}\n";
        let (symbols, refs) = parser().parse(Language::Rust, src, "src/main.rs").unwrap();
        assert!(symbols.iter().any(|s| s.name == "helper" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.name == "main" && s.kind == SymbolKind::Function));
        let call = refs.iter().find(|r| r.name == "helper" && r.ref_kind == RefKind::Call).unwrap();
        assert_eq!(call.scope_name.as_deref(), Some("main"));
    }

    #[test]
    fn rust_struct_and_impl_share_container_name() {
        let src = b"struct Foo;\nimpl Foo {\n    fn bar(&self) {}\n}\n";
        let (symbols, _) = parser().parse(Language::Rust, src, "src/lib.rs").unwrap();
        let method = symbols.iter().find(|s| s.name == "bar").unwrap();
        assert_eq!(method.container_name(), Some("Foo"));
    }

    #[test]
    fn python_method_is_distinguished_from_function() {
        let src = b"class Foo:\n    def bar(self):\n        pass\n\ndef baz():\n    pass\n";
        let (symbols, _) = parser().parse(Language::Python, src, "a.py").unwrap();
        let bar = symbols.iter().find(|s| s.name == "bar").unwrap();
        assert_eq!(bar.kind, SymbolKind::Method);
        let baz = symbols.iter().find(|s| s.name == "baz").unwrap();
        assert_eq!(baz.kind, SymbolKind::Function);
    }

    #[test]
    fn typescript_class_extends_and_implements_are_parsed() {
        let src = b"class Foo extends Base implements Bar, Baz {\n    m() {}\n}\n";
        let (symbols, _) = parser().parse(Language::Ts, src, "a.ts").unwrap();
        let foo = symbols.iter().find(|s| s.name == "Foo").unwrap();
        assert_eq!(foo.extends.as_deref(), Some(&["Base".to_string()][..]));
        assert_eq!(
            foo.implements.as_deref(),
            Some(&["Bar".to_string(), "Baz".to_string()][..])
        );
    }

    #[test]
    fn java_record_and_annotation_kinds_recognized() {
        let src = b"record Point(int x, int y) {}\n@interface Marker {}\n";
        let (symbols, _) = parser().parse(Language::Java, src, "A.java").unwrap();
        assert!(symbols.iter().any(|s| s.name == "Point" && s.kind == SymbolKind::Record));
        assert!(symbols.iter().any(|s| s.name == "Marker" && s.kind == SymbolKind::Annotation));
    }

    #[test]
    fn go_interface_vs_struct_type_spec() {
        let src = b"package p\ntype Reader interface {\n    Read() int\n}\ntype Buf struct {\n    n int\n}\n";
        let (symbols, _) = parser().parse(Language::Go, src, "a.go").unwrap();
        let reader = symbols.iter().find(|s| s.name == "Reader").unwrap();
        assert_eq!(reader.kind, SymbolKind::Interface);
        let buf = symbols.iter().find(|s| s.name == "Buf").unwrap();
        assert_eq!(buf.kind, SymbolKind::Class);
    }

    #[test]
    fn c_function_definition_extracted() {
        let src = b"int add(int a, int b) {\n    return a + b;\n}\n";
        let (symbols, _) = parser().parse(Language::C, src, "a.c").unwrap();
        assert!(symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let err = parser().parse(Language::Unknown, b"", "a.bin").unwrap_err();
        assert_eq!(err.reason_code(), "language_not_available");
    }

    #[test]
    fn heritage_split_is_depth_aware_across_generics() {
        let (extends, implements) = parse_heritage("class Foo<T> extends Base<Map<K, V>> implements Bar<T>, Baz");
        assert_eq!(extends, vec!["Base".to_string()]);
        assert_eq!(implements, vec!["Bar".to_string(), "Baz".to_string()]);
    }
}

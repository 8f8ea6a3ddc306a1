use async_trait::async_trait;

use crate::domain::{
    AstReference, ChainDirection, DomainError, GraphCallEdge, GraphQueryResult, GraphRefRow,
    GraphSymbolNode, GraphSymbolRow, Language, Symbol,
};

/// The AST graph store (§4.5): a relational fact base over
/// `ast_file`/`ast_symbol`/`ast_contains`/`ast_extends_name`/
/// `ast_implements_name`/`ast_refs_name`/`ast_calls_name`, with a read
/// surface of named query shapes plus one opaque Datalog-style escape hatch.
#[async_trait]
pub trait AstGraphRepository: Send + Sync {
    /// Replaces every fact for `file` with the symbols/references just
    /// parsed from it (§4.5 write discipline: `mode=put` is whole-file).
    async fn put(
        &self,
        file: &str,
        language: Language,
        symbols: &[Symbol],
        refs: &[AstReference],
    ) -> Result<(), DomainError>;

    async fn delete_file(&self, file: &str) -> Result<(), DomainError>;

    /// Symbol-name prefix search, optionally language-scoped.
    async fn find(
        &self,
        prefix: &str,
        lang: Option<Language>,
        limit: usize,
    ) -> Result<Vec<GraphSymbolRow>, DomainError>;

    /// `ast_contains` children of `parent_ref_id`.
    async fn children(
        &self,
        parent_ref_id: &str,
        lang: Option<Language>,
    ) -> Result<Vec<GraphSymbolRow>, DomainError>;

    /// Every `ast_refs_name` occurrence of `name`.
    async fn refs(
        &self,
        name: &str,
        lang: Option<Language>,
        limit: usize,
    ) -> Result<Vec<GraphRefRow>, DomainError>;

    /// Symbols whose body contains a `call(name)` reference.
    async fn callers(&self, name: &str, limit: usize) -> Result<Vec<GraphSymbolRow>, DomainError>;

    /// Names called from within the body of symbol `ref_id`.
    async fn callees(&self, ref_id: &str, limit: usize) -> Result<Vec<GraphSymbolRow>, DomainError>;

    /// BFS over `ast_calls_name`, name-joined (§4.5: approximate by
    /// contract, not resolved to a specific overload), cycle-safe via
    /// visited-id tracking, bounded by `depth`/`limit`/`min_name_len`.
    async fn chain(
        &self,
        name: &str,
        direction: ChainDirection,
        depth: usize,
        limit: usize,
        min_name_len: usize,
    ) -> Result<Vec<GraphSymbolRow>, DomainError>;

    /// Opaque read-only script against the relation tables; `params` are
    /// positionally bound. Implementations reject scripts with side effects.
    async fn query(&self, script: &str, params: &[String]) -> Result<GraphQueryResult, DomainError>;

    /// Every symbol node, for `RepoMap::compute` (§4.12).
    async fn all_symbol_nodes(&self) -> Result<Vec<GraphSymbolNode>, DomainError>;

    /// Every `ast_calls_name` edge, for `RepoMap::compute` (§4.12).
    async fn all_call_edges(&self) -> Result<Vec<GraphCallEdge>, DomainError>;
}

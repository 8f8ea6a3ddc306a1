use crate::domain::{AstReference, DomainError, Language, Symbol};

/// Wraps a concrete-syntax-tree parser (§4.2). Implementations recognize,
/// per supported language, the declaration kinds in `SymbolKind` and the
/// reference kinds in `RefKind`.
pub trait ParserService: Send + Sync {
    /// `parse(language, bytes) -> (Symbols, References)`.
    fn parse(
        &self,
        language: Language,
        bytes: &[u8],
        file_path: &str,
    ) -> Result<(Vec<Symbol>, Vec<AstReference>), DomainError>;

    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}

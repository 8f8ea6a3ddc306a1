//! Per-occurrence ref row (§2.5, §4.3, Glossary): `(ref_id, content_hash,
//! file, symbol, kind, signature, start_line, end_line)`.
//!
//! Unlike a `Chunk`, a `RefRow` is replaced wholesale per file per indexing
//! pass (§3 Lifecycles) — it records *where* a piece of content currently
//! occurs, not the content itself.

use serde::{Deserialize, Serialize};

use super::SymbolKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefRow {
    pub ref_id: String,
    pub content_hash: String,
    pub file: String,
    pub symbol: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl RefRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ref_id: impl Into<String>,
        content_hash: impl Into<String>,
        file: impl Into<String>,
        symbol: impl Into<String>,
        kind: SymbolKind,
        signature: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            content_hash: content_hash.into(),
            file: file.into(),
            symbol: symbol.into(),
            kind,
            signature: signature.into(),
            start_line,
            end_line,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_is_inclusive() {
        let row = RefRow::new("r1", "c1", "a.rs", "f", SymbolKind::Function, "fn f()", 10, 12);
        assert_eq!(row.line_count(), 3);
    }
}

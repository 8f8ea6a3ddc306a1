//! Parse-failure degradation modes (§4.2, §9 design note).
//!
//! When the parser adapter cannot produce a concrete syntax tree for a file
//! (unsupported syntax, grammar panic, truncated input), indexing degrades
//! per this enum rather than failing the run. All fallback paths must emit
//! `Symbol`s with `kind == SymbolKind::Document` so downstream stores stay
//! typed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ParseFailureFallback {
    /// Emit nothing for the file.
    Skip,
    /// Emit N-line virtual document symbols.
    LineChunk { max_chars: usize },
    /// Emit a single file-spanning document symbol.
    TextOnly,
}

impl Default for ParseFailureFallback {
    fn default() -> Self {
        ParseFailureFallback::LineChunk { max_chars: 2000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_line_chunk() {
        assert_eq!(
            ParseFailureFallback::default(),
            ParseFailureFallback::LineChunk { max_chars: 2000 }
        );
    }
}

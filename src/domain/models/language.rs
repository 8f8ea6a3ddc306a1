use serde::{Deserialize, Serialize};
use std::path::Path;

/// The eight vector-store partitions (§4.3). `Ts` covers the JS/TS/JSX/TSX
/// extension family — the parser adapter picks the JavaScript or TypeScript
/// tree-sitter grammar internally based on the concrete extension, but they
/// share one partition and one `Language` value because the spec's extension
/// map collapses them (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Ts,
    Python,
    Go,
    Rust,
    C,
    Markdown,
    Yaml,
    Unknown,
}

impl Language {
    /// Extension → language inference (§4.6): `.md|.mdx→markdown`,
    /// `.yml|.yaml→yaml`, `.java→java`, `.c|.h→c`, `.go→go`, `.py→python`,
    /// `.rs→rust`, `.ts|.tsx|.js|.jsx→ts`.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "mdx" => Language::Markdown,
            "yml" | "yaml" => Language::Yaml,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "go" => Language::Go,
            "py" => Language::Python,
            "rs" => Language::Rust,
            "ts" | "tsx" | "js" | "jsx" => Language::Ts,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "java" => Language::Java,
            "ts" => Language::Ts,
            "python" => Language::Python,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "c" => Language::C,
            "markdown" => Language::Markdown,
            "yaml" => Language::Yaml,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Ts => "ts",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    pub fn primary_extension(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Ts => "ts",
            Language::Python => "py",
            Language::Go => "go",
            Language::Rust => "rs",
            Language::C => "c",
            Language::Markdown => "md",
            Language::Yaml => "yaml",
            Language::Unknown => "",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Java => &["java"],
            Language::Ts => &["ts", "tsx", "js", "jsx"],
            Language::Python => &["py"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::C => &["c", "h"],
            Language::Markdown => &["md", "mdx"],
            Language::Yaml => &["yml", "yaml"],
            Language::Unknown => &[],
        }
    }

    /// Declaration-kind documents (§3) use brace-delimited bodies, except
    /// for the two prose/markup languages which have no call/heritage model.
    pub fn uses_braces(&self) -> bool {
        !matches!(self, Language::Markdown | Language::Yaml)
    }

    pub fn is_statically_typed(&self) -> bool {
        matches!(self, Language::Java | Language::Ts | Language::Go | Language::Rust | Language::C)
    }

    /// Whether this language has a heritage model (`extends`/`implements`)
    /// worth parsing from the declaration header.
    pub fn supports_heritage(&self) -> bool {
        matches!(self, Language::Java | Language::Ts)
    }

    pub fn all_supported() -> Vec<Language> {
        vec![
            Language::Java,
            Language::Ts,
            Language::Python,
            Language::Go,
            Language::Rust,
            Language::C,
            Language::Markdown,
            Language::Yaml,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::Ts);
        assert_eq!(Language::from_extension("tsx"), Language::Ts);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("java"), Language::Java);
        assert_eq!(Language::from_extension("h"), Language::C);
        assert_eq!(Language::from_extension("MD"), Language::Markdown);
        assert_eq!(Language::from_extension("yaml"), Language::Yaml);
        assert_eq!(Language::from_extension("txt"), Language::Unknown);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("src/main.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("script.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("index.tsx")), Language::Ts);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!(Language::parse("rust"), Language::Rust);
        assert_eq!(Language::parse("PYTHON"), Language::Python);
        assert_eq!(Language::parse("unknown_lang"), Language::Unknown);
    }

    #[test]
    fn test_is_known() {
        assert!(Language::Rust.is_known());
        assert!(Language::Python.is_known());
        assert!(!Language::Unknown.is_known());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Language::Ts.extensions(), &["ts", "tsx", "js", "jsx"]);
        assert_eq!(Language::Rust.extensions(), &["rs"]);
    }

    #[test]
    fn test_all_supported() {
        let supported = Language::all_supported();
        assert_eq!(supported.len(), 8);
        assert!(supported.contains(&Language::Rust));
        assert!(supported.contains(&Language::Markdown));
        assert!(!supported.contains(&Language::Unknown));
    }

    #[test]
    fn test_supports_heritage() {
        assert!(Language::Java.supports_heritage());
        assert!(Language::Ts.supports_heritage());
        assert!(!Language::Python.supports_heritage());
        assert!(!Language::Markdown.supports_heritage());
    }
}

//! Deterministic Semantic Record generator (§4.9).
//!
//! Diffs one commit against its first parent (or the empty tree at the
//! repository root), re-parses the before/after snapshot of every changed
//! file, pairs their symbols via three-pass matching, and writes the
//! canonical, content-addressed DSR for that commit. Also answers the
//! symbol-evolution query by walking the commit graph and re-opening each
//! commit's already-written DSR.
//!
//! Grounded in the corpus's `tokio::process::Command`-based external-tool
//! invocation pattern (`connector/adapter/scip/indexer.rs` shells out to a
//! binary and parses its stdout) — reused here for the Git plumbing this
//! spec names explicitly (§6 *Git commands the system assumes*).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::ParserService;
use crate::domain::{
    hash_bytes, AstEdgeOperation, DeterministicSemanticRecord, DomainError, DsrOperation, Language,
    Symbol, SymbolKind, SymbolOperation, SymbolSnapshot,
};

/// One entry in a parsed snapshot: the declared symbol plus its
/// byte-range content hash (§4.9 step 3).
struct Entry {
    symbol: Symbol,
    content_hash: String,
}

/// Hashes a symbol's body for Pass-3 pairing, excluding the declaration
/// line itself (`start_line`) since it carries the symbol's name — a pure
/// rename (§8 scenario 2) changes only that line, and Pass 3 exists
/// precisely to pair symbols whose name differs, so the hash it pairs on
/// must not be sensitive to the name. Single-line declarations (no body
/// beyond the header) hash to the same empty string on both sides.
fn body_content_hash(lines: &[&str], start_line: u32, end_line: u32) -> String {
    let body_start = (start_line.saturating_sub(1) as usize + 1).min(lines.len());
    let end = (end_line as usize).min(lines.len());
    let slice = if body_start < end { lines[body_start..end].join("\n") } else { String::new() };
    hash_bytes(&slice)
}

impl Entry {
    fn exact_key(&self) -> (String, Option<String>, SymbolKind, String, String) {
        self.symbol.exact_key()
    }

    fn name_key(&self) -> (String, Option<String>, SymbolKind, String) {
        self.symbol.name_key()
    }

    fn content_key(&self) -> (String, Option<String>, SymbolKind, String) {
        (
            self.symbol.file_path.clone(),
            self.symbol.container_name().map(str::to_owned),
            self.symbol.kind,
            self.content_hash.clone(),
        )
    }

    fn snapshot(&self) -> SymbolSnapshot {
        SymbolSnapshot {
            name: self.symbol.name.clone(),
            kind: self.symbol.kind,
            file: self.symbol.file_path.clone(),
            container: self.symbol.container_name().map(str::to_owned),
            signature: self.symbol.signature.clone(),
            content_hash: self.content_hash.clone(),
            start_line: self.symbol.start_line,
            end_line: self.symbol.end_line,
        }
    }
}

pub struct DsrGeneratorUseCase {
    parser: std::sync::Arc<dyn ParserService>,
    repo_root: PathBuf,
    dsr_dir: PathBuf,
}

impl DsrGeneratorUseCase {
    pub fn new(parser: std::sync::Arc<dyn ParserService>, repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let dsr_dir = repo_root.join(".git-ai").join("dsr");
        Self { parser, repo_root, dsr_dir }
    }

    async fn run_git(&self, args: &[&str]) -> Result<String, DomainError> {
        let output = Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::internal(format!("failed to spawn git {:?}: {}", args, e)))?;

        if !output.status.success() {
            return Err(DomainError::internal(format!(
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn first_parent(&self, commit: &str) -> Result<Option<String>, DomainError> {
        let out = self.run_git(&["show", "-s", "--format=%P", commit]).await?;
        let parents = out.trim();
        if parents.is_empty() {
            return Ok(None);
        }
        Ok(parents.split_whitespace().next().map(str::to_string))
    }

    /// `git show <rev>:<path>`, or `None` when the path does not exist at
    /// that revision (added/deleted files).
    async fn show_file(&self, rev: &str, path: &str) -> Option<Vec<u8>> {
        let output = Command::new("git")
            .current_dir(&self.repo_root)
            .args(["show", &format!("{}:{}", rev, path)])
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(output.stdout)
    }

    /// `git diff-tree --root --no-commit-id --name-status -r <commit>`:
    /// returns `(status, path)` pairs.
    async fn changed_paths(&self, commit: &str) -> Result<Vec<(char, String)>, DomainError> {
        let out = self
            .run_git(&["diff-tree", "--root", "--no-commit-id", "--name-status", "-r", commit])
            .await?;

        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut parts = line.split('\t');
                let status = parts.next()?.chars().next()?;
                let path = parts.next()?.to_string();
                Some((status, path))
            })
            .collect())
    }

    async fn parse_snapshot(&self, bytes: &[u8], path: &str) -> Vec<Entry> {
        let language = Language::from_path(Path::new(path));
        if language == Language::Unknown || !self.parser.supports_language(language) {
            return Vec::new();
        }

        let (symbols, _refs) = match self.parser.parse(language, bytes, path) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = path, error = %e, "DSR snapshot parse failed, treating as empty");
                return Vec::new();
            }
        };

        let text = String::from_utf8_lossy(bytes);
        let lines: Vec<&str> = text.lines().collect();

        symbols
            .into_iter()
            .map(|symbol| {
                let content_hash = body_content_hash(&lines, symbol.start_line, symbol.end_line);
                Entry { symbol, content_hash }
            })
            .collect()
    }

    /// §4.9 steps 4-6: three-pass matching plus derived containment-edge
    /// operations, over one file's before/after symbol snapshots.
    fn match_symbols(before: Vec<Entry>, after: Vec<Entry>) -> (Vec<SymbolOperation>, Vec<AstEdgeOperation>) {
        let mut matched_before = vec![false; before.len()];
        let mut matched_after = vec![false; after.len()];
        let mut ops = Vec::new();

        // Pass 1: exact key.
        let mut before_by_exact: HashMap<_, Vec<usize>> = HashMap::new();
        for (i, e) in before.iter().enumerate() {
            before_by_exact.entry(e.exact_key()).or_default().push(i);
        }
        let mut after_by_exact: HashMap<_, Vec<usize>> = HashMap::new();
        for (i, e) in after.iter().enumerate() {
            after_by_exact.entry(e.exact_key()).or_default().push(i);
        }
        for (key, before_idxs) in &before_by_exact {
            if let Some(after_idxs) = after_by_exact.get(key) {
                for (&bi, &ai) in before_idxs.iter().zip(after_idxs.iter()) {
                    matched_before[bi] = true;
                    matched_after[ai] = true;
                    if before[bi].content_hash != after[ai].content_hash {
                        ops.push(SymbolOperation {
                            operation: DsrOperation::Modify,
                            symbol: after[ai].snapshot(),
                            previous: Some(before[bi].snapshot()),
                        });
                    }
                }
            }
        }

        // Pass 2: key ignoring signature, exactly-one-candidate residuals.
        let residual_before: Vec<usize> = (0..before.len()).filter(|&i| !matched_before[i]).collect();
        let residual_after: Vec<usize> = (0..after.len()).filter(|&i| !matched_after[i]).collect();

        let mut before_by_name: HashMap<_, Vec<usize>> = HashMap::new();
        for &i in &residual_before {
            before_by_name.entry(before[i].name_key()).or_default().push(i);
        }
        let mut after_by_name: HashMap<_, Vec<usize>> = HashMap::new();
        for &i in &residual_after {
            after_by_name.entry(after[i].name_key()).or_default().push(i);
        }
        for (key, before_idxs) in &before_by_name {
            if before_idxs.len() != 1 {
                continue;
            }
            if let Some(after_idxs) = after_by_name.get(key) {
                if after_idxs.len() == 1 {
                    let bi = before_idxs[0];
                    let ai = after_idxs[0];
                    matched_before[bi] = true;
                    matched_after[ai] = true;
                    ops.push(SymbolOperation {
                        operation: DsrOperation::Modify,
                        symbol: after[ai].snapshot(),
                        previous: Some(before[bi].snapshot()),
                    });
                }
            }
        }

        // Pass 3: key ignoring signature and name, exactly-one-candidate residuals.
        let residual_before: Vec<usize> = (0..before.len()).filter(|&i| !matched_before[i]).collect();
        let residual_after: Vec<usize> = (0..after.len()).filter(|&i| !matched_after[i]).collect();

        let mut before_by_content: HashMap<_, Vec<usize>> = HashMap::new();
        for &i in &residual_before {
            before_by_content.entry(before[i].content_key()).or_default().push(i);
        }
        let mut after_by_content: HashMap<_, Vec<usize>> = HashMap::new();
        for &i in &residual_after {
            after_by_content.entry(after[i].content_key()).or_default().push(i);
        }
        for (key, before_idxs) in &before_by_content {
            if before_idxs.len() != 1 {
                continue;
            }
            if let Some(after_idxs) = after_by_content.get(key) {
                if after_idxs.len() == 1 {
                    let bi = before_idxs[0];
                    let ai = after_idxs[0];
                    matched_before[bi] = true;
                    matched_after[ai] = true;

                    let name_or_sig_changed = before[bi].symbol.name != after[ai].symbol.name
                        || before[bi].symbol.signature != after[ai].symbol.signature;

                    let operation = if name_or_sig_changed { DsrOperation::Rename } else { DsrOperation::Modify };
                    ops.push(SymbolOperation {
                        operation,
                        symbol: after[ai].snapshot(),
                        previous: Some(before[bi].snapshot()),
                    });
                }
            }
        }

        // Remaining after-residuals: add. Remaining before-residuals: delete.
        let mut edge_ops = Vec::new();
        for (i, entry) in after.iter().enumerate() {
            if !matched_after[i] {
                ops.push(SymbolOperation { operation: DsrOperation::Add, symbol: entry.snapshot(), previous: None });
                let parent = entry.symbol.container_name().unwrap_or(&entry.symbol.file_path).to_string();
                edge_ops.push(AstEdgeOperation {
                    operation: DsrOperation::Add,
                    relation: "contains".to_string(),
                    parent,
                    child: entry.symbol.name.clone(),
                });
            }
        }
        for (i, entry) in before.iter().enumerate() {
            if !matched_before[i] {
                ops.push(SymbolOperation { operation: DsrOperation::Delete, symbol: entry.snapshot(), previous: None });
                let parent = entry.symbol.container_name().unwrap_or(&entry.symbol.file_path).to_string();
                edge_ops.push(AstEdgeOperation {
                    operation: DsrOperation::Delete,
                    relation: "contains".to_string(),
                    parent,
                    child: entry.symbol.name.clone(),
                });
            }
        }

        // Rename: the containment edge's child identity changes, so it is
        // modelled as one edge lost plus one edge gained (§9 *Cyclic
        // references* note on deriving edges from symbol ids).
        for op in ops.iter().filter(|o| o.operation == DsrOperation::Rename) {
            let prev = op.previous.as_ref().expect("rename always carries previous");
            let parent = prev.container.clone().unwrap_or_else(|| prev.file.clone());
            edge_ops.push(AstEdgeOperation {
                operation: DsrOperation::Delete,
                relation: "contains".to_string(),
                parent: parent.clone(),
                child: prev.name.clone(),
            });
            edge_ops.push(AstEdgeOperation {
                operation: DsrOperation::Add,
                relation: "contains".to_string(),
                parent,
                child: op.symbol.name.clone(),
            });
        }

        (ops, edge_ops)
    }

    /// §4.9: generates and atomically writes the DSR for `commit`.
    pub async fn generate(&self, commit: &str) -> Result<DeterministicSemanticRecord, DomainError> {
        let parent = self.first_parent(commit).await?;
        let changed = self.changed_paths(commit).await?;

        let mut all_ops = Vec::new();
        let mut all_edge_ops = Vec::new();

        for (status, path) in &changed {
            let before_bytes = match &parent {
                Some(p) => self.show_file(p, path).await.unwrap_or_default(),
                None => Vec::new(),
            };
            let after_bytes = if *status == 'D' { Vec::new() } else { self.show_file(commit, path).await.unwrap_or_default() };

            let before = self.parse_snapshot(&before_bytes, path).await;
            let after = self.parse_snapshot(&after_bytes, path).await;

            let (ops, edge_ops) = Self::match_symbols(before, after);
            all_ops.extend(ops);
            all_edge_ops.extend(edge_ops);
        }

        all_ops.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        all_edge_ops.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let op_kinds: Vec<DsrOperation> = all_ops.iter().map(|o| o.operation).collect();
        let semantic_change_type = DeterministicSemanticRecord::classify_change_type(&op_kinds);
        let risk_level = DeterministicSemanticRecord::classify_risk(&op_kinds);

        let dsr = DeterministicSemanticRecord {
            commit: commit.to_string(),
            parent_commit: parent,
            affected_symbols: all_ops,
            ast_operations: all_edge_ops,
            semantic_change_type,
            risk_level,
        };

        self.write_atomic(&dsr).await?;
        Ok(dsr)
    }

    async fn write_atomic(&self, dsr: &DeterministicSemanticRecord) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.dsr_dir)
            .await
            .map_err(|e| DomainError::storage(format!("failed to create DSR directory: {}", e)))?;

        let final_path = self.dsr_dir.join(format!("{}.json", dsr.commit));
        let canonical = dsr
            .to_canonical_json()
            .map_err(|e| DomainError::internal(format!("failed to serialize DSR: {}", e)))?;

        if let Ok(existing) = tokio::fs::read_to_string(&final_path).await {
            if existing != canonical {
                return Err(DomainError::dsr_conflict(dsr.commit.clone()));
            }
            debug!(commit = %dsr.commit, "DSR already written byte-identical, skipping rewrite");
            return Ok(());
        }

        let tmp_path = self
            .dsr_dir
            .join(format!(".{}.json.tmp-{}-{}", dsr.commit, process::id(), std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)));

        tokio::fs::write(&tmp_path, &canonical)
            .await
            .map_err(|e| DomainError::storage(format!("failed to write DSR tmp file: {}", e)))?;

        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| DomainError::storage(format!("failed to rename DSR tmp file into place: {}", e)))?;

        Ok(())
    }

    /// Symbol evolution query: walks `git rev-list --topo-order [--all]
    /// [-n L] <start>`, opening each commit's already-written DSR and
    /// collecting hits where any operation names `symbol` (exact or
    /// substring match).
    pub async fn symbol_evolution(&self, start: &str, all: bool, limit: Option<usize>, symbol: &str) -> Result<Vec<DeterministicSemanticRecord>, DomainError> {
        let mut args = vec!["rev-list", "--topo-order"];
        if all {
            args.push("--all");
        }
        let limit_arg;
        if let Some(n) = limit {
            limit_arg = format!("-n{}", n);
            args.push(&limit_arg);
        }
        args.push(start);

        let out = self.run_git(&args).await?;
        let commits: Vec<&str> = out.lines().filter(|l| !l.is_empty()).collect();

        let mut hits = Vec::new();
        let mut missing = Vec::new();

        for commit in commits {
            let path = self.dsr_dir.join(format!("{}.json", commit));
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<DeterministicSemanticRecord>(&content) {
                    Ok(dsr) => {
                        let matches = dsr.affected_symbols.iter().any(|op| {
                            op.symbol.name == symbol
                                || op.symbol.name.contains(symbol)
                                || op.previous.as_ref().is_some_and(|p| p.name == symbol || p.name.contains(symbol))
                        });
                        if matches {
                            hits.push(dsr);
                        }
                    }
                    Err(e) => warn!(commit, error = %e, "unreadable DSR file, treating as missing"),
                },
                Err(_) => missing.push(commit.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DomainError::missing_dsr(missing));
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AstReference, Language as Lang};

    struct LineParser;

    impl ParserService for LineParser {
        fn parse(&self, language: Language, bytes: &[u8], file_path: &str) -> Result<(Vec<Symbol>, Vec<AstReference>), DomainError> {
            let text = String::from_utf8_lossy(bytes);
            let mut symbols = Vec::new();
            for (i, line) in text.lines().enumerate() {
                if let Some(rest) = line.strip_prefix("fn ") {
                    let name = rest.split('(').next().unwrap_or(rest).to_string();
                    symbols.push(Symbol::new(name, SymbolKind::Function, line, (i + 1) as u32, (i + 1) as u32, language, file_path));
                }
            }
            Ok((symbols, vec![]))
        }

        fn supported_languages(&self) -> Vec<Language> {
            vec![Lang::Rust]
        }
    }

    fn entries(src: &str, path: &str) -> Vec<Entry> {
        let parser = LineParser;
        let (symbols, _) = parser.parse(Language::Rust, src.as_bytes(), path).unwrap();
        let lines: Vec<&str> = src.lines().collect();
        symbols
            .into_iter()
            .map(|s| {
                let content_hash = body_content_hash(&lines, s.start_line, s.end_line);
                Entry { content_hash, symbol: s }
            })
            .collect()
    }

    #[test]
    fn unchanged_symbol_produces_no_operation() {
        let before = entries("fn greet(a)", "a.rs");
        let after = entries("fn greet(a)", "a.rs");
        let (ops, _) = DsrGeneratorUseCase::match_symbols(before, after);
        assert!(ops.is_empty());
    }

    #[test]
    fn added_symbol_is_an_add_with_contains_edge() {
        let before = entries("fn greet(a)", "a.rs");
        let after = entries("fn greet(a)\nfn farewell(a)", "a.rs");
        let (ops, edges) = DsrGeneratorUseCase::match_symbols(before, after);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation, DsrOperation::Add);
        assert_eq!(ops[0].symbol.name, "farewell(a)");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].operation, DsrOperation::Add);
    }

    #[test]
    fn deleted_symbol_is_a_delete() {
        let before = entries("fn greet(a)\nfn farewell(a)", "a.rs");
        let after = entries("fn greet(a)", "a.rs");
        let (ops, _) = DsrGeneratorUseCase::match_symbols(before, after);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation, DsrOperation::Delete);
    }

    #[test]
    fn signature_change_on_same_name_is_a_modify() {
        let before = entries("fn greet(a)", "a.rs");
        let after = entries("fn greet(a, b)", "a.rs");
        let (ops, _) = DsrGeneratorUseCase::match_symbols(before, after);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation, DsrOperation::Modify);
    }

    #[test]
    fn rename_with_unchanged_body_is_a_single_rename_op() {
        // §8 scenario 2: only the declaration line changes; Pass 1 and Pass 2
        // both fail on the new name, so Pass 3 must pair them on body content
        // alone (the declaration line is excluded from that hash) rather than
        // falling through to a delete+add pair.
        let before = entries("fn greet(a)\nfn other(x)", "a.rs");
        let after = entries("fn sayHi(a)\nfn other(x)", "a.rs");
        let (ops, edges) = DsrGeneratorUseCase::match_symbols(before, after);

        assert_eq!(ops.len(), 1, "expected exactly one op, got {:?}", ops.iter().map(|o| o.operation).collect::<Vec<_>>());
        assert_eq!(ops[0].operation, DsrOperation::Rename);
        assert_eq!(ops[0].symbol.name, "sayHi");
        assert_eq!(ops[0].previous.as_ref().unwrap().name, "greet");

        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.operation == DsrOperation::Delete && e.child == "greet"));
        assert!(edges.iter().any(|e| e.operation == DsrOperation::Add && e.child == "sayHi"));
    }

    #[test]
    fn body_content_hash_excludes_the_declaration_line() {
        let lines = vec!["fn greet(a) {", "    body()", "}"];
        let renamed = vec!["fn sayHi(a) {", "    body()", "}"];
        assert_eq!(body_content_hash(&lines, 1, 3), body_content_hash(&renamed, 1, 3));
    }
}

//! Indexer (§4.6 full, §4.7 incremental).
//!
//! Full indexing walks the scan root through the three-file ignore pipeline,
//! fans parsing out to the worker pool, and folds the results back on this
//! task: chunk dedup, embedding, AST-graph writes, and the `meta.json`
//! snapshot all happen here, never inside a worker (§5 *scheduling model*).
//! Incremental indexing takes a caller-supplied change list instead of
//! walking the tree, deletes strictly before it re-processes, and can read
//! either the worktree or a specific Git ref's staged blob per file.
//!
//! Grounded in the corpus's directory-walk-then-fan-out indexing use case
//! (`ignore::WalkBuilder` enumeration submitted to a worker pool, merged back
//! on the orchestrating task) — generalized here to the two-phase
//! (serial-delete, parallel-process) incremental contract the spec adds, and
//! to the `git diff --name-status` change list §4.7 names as its input.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use ignore::WalkBuilder;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::{
    parallelism_disabled, AnnIndex, AstGraphRepository, ParserService, SemanticEmbedder, VectorRepository, WorkerPool,
};
use crate::domain::ignore_rules::IgnorePipeline;
use crate::domain::quantization::quantize;
use crate::domain::{
    content_hash, posix_rel_path, ref_id, AstGraphStatus, AstReference, Chunk, CodeIntelConfig, DomainError, IndexMeta,
    Language, ParseFailureFallback, RefRow, Symbol, SymbolKind,
};

/// Progress callback fed to both indexing modes (§5 *cancellation & timeouts*
/// callback requirement): total files in this run, files processed so far,
/// and the path most recently finished.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, total_files: usize, processed_files: usize, current_file: &str);
}

/// No-op observer for callers that don't need progress reporting.
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _total_files: usize, _processed_files: usize, _current_file: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One entry of the incremental change list (§4.7 step 1: `git diff
/// --name-status` between two refs, or worktree status).
#[derive(Debug, Clone)]
pub struct FileChange {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>,
}

/// Which blob an incremental run reads file content from (§4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Read from the working tree on disk.
    Worktree,
    /// Read the index's staged blob via `git show :<path>`.
    Staged,
}

/// Orchestrates one full or incremental indexing run over the five storage
/// ports (§4.6/§4.7).
pub struct IndexerUseCase {
    parser: Arc<dyn ParserService>,
    embedder: Arc<dyn SemanticEmbedder>,
    vector_repo: Arc<dyn VectorRepository>,
    ann_index: Arc<dyn AnnIndex>,
    ast_graph: Arc<dyn AstGraphRepository>,
    config: CodeIntelConfig,
}

impl IndexerUseCase {
    pub fn new(
        parser: Arc<dyn ParserService>,
        embedder: Arc<dyn SemanticEmbedder>,
        vector_repo: Arc<dyn VectorRepository>,
        ann_index: Arc<dyn AnnIndex>,
        ast_graph: Arc<dyn AstGraphRepository>,
        config: CodeIntelConfig,
    ) -> Self {
        Self { parser, embedder, vector_repo, ann_index, ast_graph, config }
    }

    /// Full index (§4.6): walk `scan_root` (relative paths computed against
    /// `repo_root`), parse every indexed file, and write a fresh `meta.json`.
    pub async fn index_full(
        &self,
        repo_root: &Path,
        scan_root: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<IndexMeta, DomainError> {
        let pipeline = self.build_ignore_pipeline(repo_root).await;
        let entries = self.enumerate_files(repo_root, scan_root, &pipeline);
        info!(files = entries.len(), "starting full index");

        let scan_root_rel = scan_root
            .strip_prefix(repo_root)
            .unwrap_or(scan_root)
            .to_string_lossy()
            .into_owned();
        let mut meta = IndexMeta::new(
            self.config.embedding_dim,
            ".git-ai/lancedb",
            if scan_root_rel.is_empty() { ".".to_string() } else { scan_root_rel },
            AstGraphStatus::enabled("sqlite", None),
        );
        meta.commit_hash = self.current_commit(repo_root).await;

        self.run_pipeline(repo_root, &entries, None, &mut meta, progress).await?;
        self.write_meta(repo_root, &meta).await?;
        Ok(meta)
    }

    /// Incremental index (§4.7): deletions run serially and strictly before
    /// any re-processing, then adds/modifies/renames are parsed and folded in
    /// exactly like the full-index path.
    pub async fn index_incremental(
        &self,
        repo_root: &Path,
        changes: &[FileChange],
        source: ChangeSource,
        progress: &dyn ProgressObserver,
    ) -> Result<IndexMeta, DomainError> {
        for change in changes {
            match change.status {
                ChangeStatus::Deleted => self.delete_path(&change.path).await?,
                ChangeStatus::Renamed => {
                    if let Some(old) = &change.old_path {
                        self.delete_path(old).await?;
                    }
                }
                ChangeStatus::Added | ChangeStatus::Modified => {}
            }
        }

        let entries: Vec<(String, Language)> = changes
            .iter()
            .filter(|c| c.status != ChangeStatus::Deleted)
            .filter_map(|c| {
                let language = Language::from_path(Path::new(&c.path));
                language.is_known().then_some((c.path.clone(), language))
            })
            .collect();

        let mut meta = self.load_meta(repo_root).await?;
        meta.commit_hash = self.current_commit(repo_root).await;

        self.run_pipeline(repo_root, &entries, Some(source), &mut meta, progress).await?;
        self.write_meta(repo_root, &meta).await?;
        Ok(meta)
    }

    async fn delete_path(&self, path: &str) -> Result<(), DomainError> {
        let language = Language::from_path(Path::new(path));
        if language.is_known() {
            self.vector_repo.delete_refs_by_file(language, path).await?;
        }
        self.ast_graph.delete_file(path).await?;
        Ok(())
    }

    async fn load_meta(&self, repo_root: &Path) -> Result<IndexMeta, DomainError> {
        let path = repo_root.join(".git-ai").join("meta.json");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::index_missing_or_incompatible(format!("meta.json missing: {e}")))?;
        let meta = IndexMeta::from_json(&contents)
            .map_err(|e| DomainError::index_missing_or_incompatible(format!("meta.json unreadable: {e}")))?;
        if !meta.is_schema_compatible() {
            return Err(DomainError::index_missing_or_incompatible(format!(
                "on-disk schema version {} != {}",
                meta.index_schema_version,
                crate::domain::INDEX_SCHEMA_VERSION
            )));
        }
        Ok(meta)
    }

    async fn build_ignore_pipeline(&self, repo_root: &Path) -> IgnorePipeline {
        let aiignore = tokio::fs::read_to_string(repo_root.join(".aiignore")).await.unwrap_or_default();
        let gitignore = tokio::fs::read_to_string(repo_root.join(".gitignore")).await.unwrap_or_default();
        let include = tokio::fs::read_to_string(repo_root.join(".git-ai").join("include.txt"))
            .await
            .unwrap_or_default();
        IgnorePipeline::new(&aiignore, &gitignore, &include)
    }

    /// Enumerates files under `scan_root` with the teacher's own
    /// `ignore::WalkBuilder` (hidden-file/`.git`-style pruning comes from the
    /// walker itself); `.gitignore`/`.aiignore`/`include.txt` precedence is
    /// then decided by `IgnorePipeline::is_indexed`, not by the walker's own
    /// ignore-file application — the walker's built-in gitignore handling is
    /// disabled so an `include.txt` override can still surface a path the
    /// repo's `.gitignore` would otherwise have pruned before we ever saw it.
    fn enumerate_files(&self, repo_root: &Path, scan_root: &Path, pipeline: &IgnorePipeline) -> Vec<(String, Language)> {
        let mut out = Vec::new();
        let walker = WalkBuilder::new(scan_root)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .build();

        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let rel = match entry.path().strip_prefix(repo_root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel_str = posix_rel_path(&rel.to_string_lossy());
            let language = Language::from_path(entry.path());
            if !language.is_known() || !pipeline.is_indexed(&rel_str) {
                continue;
            }
            out.push((rel_str, language));
        }
        out
    }

    async fn current_commit(&self, repo_root: &Path) -> Option<String> {
        let output = Command::new("git")
            .current_dir(repo_root)
            .args(["rev-parse", "HEAD"])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn read_bytes(repo_root: &Path, rel_path: &str, source: Option<ChangeSource>) -> Result<Vec<u8>, DomainError> {
        match source {
            None | Some(ChangeSource::Worktree) => tokio::fs::read(repo_root.join(rel_path))
                .await
                .map_err(|e| DomainError::worker_failure(rel_path.to_string(), format!("read failed: {e}"))),
            Some(ChangeSource::Staged) => {
                let output = Command::new("git")
                    .current_dir(repo_root)
                    .args(["show", &format!(":{rel_path}")])
                    .output()
                    .await
                    .map_err(|e| DomainError::internal(format!("git show failed: {e}")))?;
                if !output.status.success() {
                    return Err(DomainError::worker_failure(rel_path.to_string(), "git show :<path> failed"));
                }
                Ok(output.stdout)
            }
        }
    }

    /// Shared by full and incremental: dispatches `entries` through the
    /// worker pool (bounded at `2 * pool_size` in flight) and folds each
    /// parsed result — chunk dedup/embedding, ref replacement, AST-graph
    /// write — back onto this task (§4.6 steps 3-4, §4.8).
    async fn run_pipeline(
        &self,
        repo_root: &Path,
        entries: &[(String, Language)],
        source: Option<ChangeSource>,
        meta: &mut IndexMeta,
        progress: &dyn ProgressObserver,
    ) -> Result<(), DomainError> {
        let total = entries.len();
        if total == 0 {
            return Ok(());
        }

        let pool_size = if parallelism_disabled(total, self.config.parallelism_threshold) {
            1
        } else {
            self.config.worker_pool_size()
        };
        let pool = Arc::new(WorkerPool::new(self.parser.clone(), pool_size));
        let in_flight_cap = 2 * pool_size;
        let repo_root = repo_root.to_path_buf();

        let mut stream = stream::iter(entries.iter().cloned())
            .map(|(rel_path, language)| {
                let pool = Arc::clone(&pool);
                let repo_root: PathBuf = repo_root.clone();
                async move {
                    let bytes = match Self::read_bytes(&repo_root, &rel_path, source).await {
                        Ok(b) => b,
                        Err(e) => return (rel_path, language, Vec::new(), Err(e)),
                    };
                    let fallback_bytes = bytes.clone();
                    let outcome = match pool.submit(rel_path.clone(), language, bytes).await {
                        Ok(result) => result.outcome,
                        Err(e) => Err(e),
                    };
                    (rel_path, language, fallback_bytes, outcome)
                }
            })
            .buffer_unordered(in_flight_cap);

        let mut existing_chunk_hashes: HashSet<String> = HashSet::new();
        let mut processed = 0usize;

        while let Some((rel_path, language, bytes, outcome)) = stream.next().await {
            processed += 1;
            progress.on_progress(total, processed, &rel_path);

            let parsed = match outcome {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(file = %rel_path, error = %e, "parse failed, applying fallback");
                    apply_fallback(&rel_path, language, &bytes, &self.config.parse_failure_fallback)
                }
            };

            let Some((symbols, refs)) = parsed else {
                continue;
            };

            self.ingest_parsed_file(&rel_path, language, symbols, refs, &mut existing_chunk_hashes, meta)
                .await?;
        }

        drop(stream);
        if let Ok(pool) = Arc::try_unwrap(pool) {
            pool.shutdown().await;
        }
        Ok(())
    }

    async fn ingest_parsed_file(
        &self,
        rel_path: &str,
        language: Language,
        symbols: Vec<Symbol>,
        refs: Vec<AstReference>,
        existing_chunk_hashes: &mut HashSet<String>,
        meta: &mut IndexMeta,
    ) -> Result<(), DomainError> {
        self.vector_repo.delete_refs_by_file(language, rel_path).await?;

        let mut ref_rows = Vec::with_capacity(symbols.len());
        let mut chunks_added = 0u64;

        for symbol in &symbols {
            let ch = content_hash(rel_path, symbol.kind.as_str(), &symbol.name, &symbol.signature);
            let rid = ref_id(rel_path, &symbol.name, symbol.kind.as_str(), symbol.start_line, symbol.end_line, &ch);

            ref_rows.push(RefRow::new(
                rid,
                ch.clone(),
                rel_path,
                symbol.name.clone(),
                symbol.kind,
                symbol.signature.clone(),
                symbol.start_line,
                symbol.end_line,
            ));

            if existing_chunk_hashes.insert(ch.clone()) {
                let text = if symbol.signature.is_empty() { symbol.name.clone() } else { symbol.signature.clone() };
                let embedding = self.embedder.embed_text(&text).await?;
                let quantized = quantize(&embedding, self.config.quantization_bits_clamped());
                let chunk = Chunk::new(ch.clone(), text, &quantized);
                self.vector_repo.upsert_chunk(language, &chunk).await?;
                self.ann_index.insert(&ch, &chunk).await?;
                chunks_added += 1;
            }
        }

        let refs_added = ref_rows.len() as u64;
        self.vector_repo.insert_refs(language, &ref_rows).await?;
        self.ast_graph.put(rel_path, language, &symbols, &refs).await?;

        meta.record_language(language.as_str(), chunks_added, refs_added);
        Ok(())
    }

    async fn write_meta(&self, repo_root: &Path, meta: &IndexMeta) -> Result<(), DomainError> {
        let dir = repo_root.join(".git-ai");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DomainError::storage(format!("failed to create .git-ai dir: {e}")))?;
        let json = meta
            .to_json_pretty()
            .map_err(|e| DomainError::internal(format!("failed to serialize meta.json: {e}")))?;
        tokio::fs::write(dir.join("meta.json"), json)
            .await
            .map_err(|e| DomainError::storage(format!("failed to write meta.json: {e}")))
    }
}

/// Builds the change list for an incremental run from `git diff
/// --name-status -z --find-renames [--cached]` (§4.7 step 1, §6).
pub async fn compute_git_diff(repo_root: &Path, cached: bool) -> Result<Vec<FileChange>, DomainError> {
    let mut args = vec!["diff", "--name-status", "-z", "--find-renames"];
    if cached {
        args.push("--cached");
    }

    let output = Command::new("git")
        .current_dir(repo_root)
        .args(&args)
        .output()
        .await
        .map_err(|e| DomainError::internal(format!("failed to spawn git diff: {e}")))?;

    if !output.status.success() {
        return Err(DomainError::not_a_git_repo(String::from_utf8_lossy(&output.stderr).into_owned()));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let fields: Vec<&str> = raw.split('\0').filter(|s| !s.is_empty()).collect();

    let mut changes = Vec::new();
    let mut i = 0;
    while i < fields.len() {
        let status = fields[i];
        i += 1;
        if let Some(first) = status.chars().next() {
            if first == 'R' {
                let old_path = fields.get(i).copied().unwrap_or_default().to_string();
                let new_path = fields.get(i + 1).copied().unwrap_or_default().to_string();
                i += 2;
                changes.push(FileChange { status: ChangeStatus::Renamed, path: new_path, old_path: Some(old_path) });
                continue;
            }
            let path = fields.get(i).copied().unwrap_or_default().to_string();
            i += 1;
            let change_status = match first {
                'A' => ChangeStatus::Added,
                'D' => ChangeStatus::Deleted,
                _ => ChangeStatus::Modified,
            };
            changes.push(FileChange { status: change_status, path, old_path: None });
        }
    }
    Ok(changes)
}

/// §9 design note: degrades a parse failure into a synthetic `Document`
/// symbol (or skips the file entirely) per the configured
/// `ParseFailureFallback`, instead of treating it as fatal to the whole run.
fn apply_fallback(
    rel_path: &str,
    language: Language,
    bytes: &[u8],
    fallback: &ParseFailureFallback,
) -> Option<(Vec<Symbol>, Vec<AstReference>)> {
    match fallback {
        ParseFailureFallback::Skip => None,
        ParseFailureFallback::TextOnly => {
            let text = String::from_utf8_lossy(bytes);
            let line_count = (text.lines().count().max(1)) as u32;
            let symbol = Symbol::new(rel_path.to_string(), SymbolKind::Document, "", 1, line_count, language, rel_path);
            Some((vec![symbol], Vec::new()))
        }
        ParseFailureFallback::LineChunk { max_chars } => {
            let text = String::from_utf8_lossy(bytes);
            let lines: Vec<&str> = text.lines().collect();
            if lines.is_empty() {
                let symbol = Symbol::new(format!("{rel_path}#chunk1"), SymbolKind::Document, "", 1, 1, language, rel_path);
                return Some((vec![symbol], Vec::new()));
            }

            let mut symbols = Vec::new();
            let mut chunk_start = 0usize;
            let mut char_count = 0usize;
            let mut chunk_idx = 1u32;

            for (i, line) in lines.iter().enumerate() {
                char_count += line.len() + 1;
                let is_last = i + 1 == lines.len();
                if char_count >= *max_chars || is_last {
                    let start_line = (chunk_start + 1) as u32;
                    let end_line = (i + 1) as u32;
                    let name = format!("{rel_path}#chunk{chunk_idx}");
                    symbols.push(Symbol::new(name, SymbolKind::Document, "", start_line, end_line, language, rel_path));
                    chunk_start = i + 1;
                    char_count = 0;
                    chunk_idx += 1;
                }
            }
            Some((symbols, Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::hnsw_ann_index::HnswAnnIndex;
    use crate::connector::adapter::in_memory_vector_repository::InMemoryVectorRepository;
    use crate::connector::adapter::mock_embedding::HashEmbedder;
    use crate::connector::adapter::sqlite_ast_graph_repository::SqliteAstGraphRepository;
    use crate::connector::adapter::treesitter_parser::TreeSitterParser;
    use crate::domain::hnsw::HnswParams;
    use tempfile::tempdir;

    fn make_indexer(config: CodeIntelConfig) -> IndexerUseCase {
        let parser = Arc::new(TreeSitterParser::new());
        let embedder = Arc::new(HashEmbedder::with_dimensions(config.embedding_dim as usize));
        let vector_repo = Arc::new(InMemoryVectorRepository::new());
        let params = HnswParams::clamped(16, 200, 64, 8);
        let ann_index = Arc::new(HnswAnnIndex::new(params, config.embedding_dim, 10_000));
        let ast_graph = Arc::new(SqliteAstGraphRepository::in_memory().unwrap());
        IndexerUseCase::new(parser, embedder, vector_repo, ann_index, ast_graph, config)
    }

    #[tokio::test]
    async fn full_index_discovers_and_records_a_known_language_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn greet() {}\n").unwrap();

        let mut config = CodeIntelConfig::default();
        config.parallelism_threshold = 1_000; // force single-threaded path
        let indexer = make_indexer(config);

        let meta = indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();
        assert!(meta.languages.contains(&"rust".to_string()));
        assert_eq!(meta.by_lang["rust"].refs_added, 1);

        let meta_path = dir.path().join(".git-ai").join("meta.json");
        assert!(meta_path.exists());
    }

    #[tokio::test]
    async fn unknown_extensions_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "irrelevant").unwrap();

        let indexer = make_indexer(CodeIntelConfig::default());
        let meta = indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();
        assert!(meta.languages.is_empty());
    }

    #[tokio::test]
    async fn incremental_deletion_removes_refs_before_reindexing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();

        let indexer = make_indexer(CodeIntelConfig::default());
        indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();

        std::fs::remove_file(dir.path().join("b.rs")).unwrap();
        let changes = vec![FileChange { status: ChangeStatus::Deleted, path: "b.rs".to_string(), old_path: None }];
        let meta = indexer
            .index_incremental(dir.path(), &changes, ChangeSource::Worktree, &NoopProgress)
            .await
            .unwrap();

        assert!(meta.is_schema_compatible());
        assert!(indexer.vector_repo.refs_by_file(Language::Rust, "b.rs").await.unwrap().is_empty());
    }

    #[test]
    fn line_chunk_fallback_splits_by_char_budget() {
        let bytes = "line one\nline two\nline three\n".repeat(50).into_bytes();
        let fallback = ParseFailureFallback::LineChunk { max_chars: 100 };
        let (symbols, refs) = apply_fallback("big.txt", Language::Unknown, &bytes, &fallback).unwrap();
        assert!(symbols.len() > 1);
        assert!(refs.is_empty());
        assert!(symbols.iter().all(|s| s.kind == SymbolKind::Document));
    }

    #[test]
    fn skip_fallback_drops_the_file() {
        let fallback = ParseFailureFallback::Skip;
        assert!(apply_fallback("x.rs", Language::Rust, b"garbage", &fallback).is_none());
    }
}

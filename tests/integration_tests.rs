//! End-to-end tests wiring a full index run against the in-memory adapters,
//! then exercising search, impact analysis, symbol context, and the repo map
//! against the result of that single index — the cross-module path no
//! individual unit test module covers on its own.

use std::sync::Arc;

use codeintel::domain::hnsw::HnswParams;
use codeintel::{
    AnnIndex, AstGraphRepository, CodeIntelConfig, HashEmbedder, HnswAnnIndex, ImpactAnalysisUseCase, IndexerUseCase,
    InMemoryVectorRepository, Language, NoopProgress, QueryExpander, RuleBasedQueryExpander, SearchCodeUseCase,
    SemanticEmbedder, SqliteAstGraphRepository, SymbolContextUseCase, TreeSitterParser, VectorRepository,
};
use tempfile::tempdir;

struct TestRepo {
    indexer: IndexerUseCase,
    ast_graph: Arc<dyn AstGraphRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    ann_index: Arc<dyn AnnIndex>,
    embedder: Arc<dyn SemanticEmbedder>,
}

fn build_repo() -> TestRepo {
    let config = CodeIntelConfig::default();
    let parser = Arc::new(TreeSitterParser::new());
    let embedder: Arc<dyn SemanticEmbedder> = Arc::new(HashEmbedder::with_dimensions(config.embedding_dim as usize));
    let vector_repo: Arc<dyn VectorRepository> = Arc::new(InMemoryVectorRepository::new());
    let ann_index: Arc<dyn AnnIndex> =
        Arc::new(HnswAnnIndex::new(HnswParams::clamped(16, 200, 64, 8), config.embedding_dim, 10_000));
    let ast_graph: Arc<dyn AstGraphRepository> = Arc::new(SqliteAstGraphRepository::in_memory().unwrap());

    let indexer = IndexerUseCase::new(
        parser,
        embedder.clone(),
        vector_repo.clone(),
        ann_index.clone(),
        ast_graph.clone(),
        config,
    );

    TestRepo { indexer, ast_graph, vector_repo, ann_index, embedder }
}

#[tokio::test]
async fn full_index_then_adaptive_search_finds_the_indexed_symbol() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("auth.rs"),
        "pub fn authenticate_user(token: &str) -> bool {\n    validate_token(token)\n}\n\nfn validate_token(token: &str) -> bool {\n    !token.is_empty()\n}\n",
    )
    .unwrap();

    let repo = build_repo();
    repo.indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();

    let expander: Arc<dyn QueryExpander> = Arc::new(RuleBasedQueryExpander::new());
    let search = SearchCodeUseCase::new(repo.embedder, repo.vector_repo, repo.ann_index, repo.ast_graph, expander);

    let hits = search.search("authenticate_user", 10, None).await.unwrap();
    assert!(hits.iter().any(|h| h.text.contains("authenticate_user")));
}

#[tokio::test]
async fn full_index_then_impact_analysis_finds_the_caller() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("auth.rs"),
        "pub fn authenticate_user(token: &str) -> bool {\n    validate_token(token)\n}\n\nfn validate_token(token: &str) -> bool {\n    !token.is_empty()\n}\n",
    )
    .unwrap();

    let repo = build_repo();
    repo.indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();

    let impact = ImpactAnalysisUseCase::new(repo.ast_graph);
    let analysis = impact.analyze("validate_token", 5).await.unwrap();

    assert_eq!(analysis.total_affected, 1);
    assert_eq!(analysis.by_depth[0][0].symbol, "authenticate_user");
}

#[tokio::test]
async fn full_index_then_symbol_context_reports_both_directions() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("auth.rs"),
        "pub fn authenticate_user(token: &str) -> bool {\n    validate_token(token)\n}\n\nfn validate_token(token: &str) -> bool {\n    !token.is_empty()\n}\n",
    )
    .unwrap();

    let repo = build_repo();
    repo.indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();

    let context = SymbolContextUseCase::new(repo.ast_graph);
    let ctx = context.get_context("validate_token", 100).await.unwrap();

    assert_eq!(ctx.caller_count, 1);
    assert_eq!(ctx.callers[0].symbol, "authenticate_user");
    assert_eq!(ctx.callee_count, 0);
}

#[tokio::test]
async fn incremental_reindex_after_deletion_drops_stale_refs() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.rs"), "pub fn a() {}\n").unwrap();
    std::fs::write(dir.path().join("b.rs"), "pub fn b() { a(); }\n").unwrap();

    let repo = build_repo();
    repo.indexer.index_full(dir.path(), dir.path(), &NoopProgress).await.unwrap();

    let context = SymbolContextUseCase::new(repo.ast_graph.clone());
    let before = context.get_context("a", 100).await.unwrap();
    assert_eq!(before.caller_count, 1);

    std::fs::remove_file(dir.path().join("b.rs")).unwrap();
    let changes = vec![codeintel::FileChange {
        status: codeintel::ChangeStatus::Deleted,
        path: "b.rs".to_string(),
        old_path: None,
    }];
    repo.indexer
        .index_incremental(dir.path(), &changes, codeintel::ChangeSource::Worktree, &NoopProgress)
        .await
        .unwrap();

    let after = context.get_context("a", 100).await.unwrap();
    assert_eq!(after.caller_count, 0);
}

#[test]
fn language_detection_matches_known_extensions() {
    use std::path::Path;

    assert_eq!(Language::from_path(Path::new("main.rs")), Language::Rust);
    assert_eq!(Language::from_path(Path::new("app.py")), Language::Python);
    assert_eq!(Language::from_path(Path::new("index.js")), Language::Ts);
    assert_eq!(Language::from_path(Path::new("app.tsx")), Language::Ts);
    assert_eq!(Language::from_path(Path::new("readme.md")), Language::Markdown);
}

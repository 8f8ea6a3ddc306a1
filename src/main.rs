//! CodeIntel CLI — repository-local code intelligence: semantic search, AST
//! graph navigation, blast-radius analysis, symbol context, the repo map,
//! and per-commit Deterministic Semantic Records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use codeintel::domain::hnsw::HnswParams;
use codeintel::domain::repo_map::{RepoMap, SymbolEdge, SymbolNode};
use codeintel::{
    compute_git_diff, AnnIndex, AstGraphRepository, ChangeSource, CodeIntelConfig, DomainError, DsrGeneratorUseCase,
    HashEmbedder, HnswAnnIndex, ImpactAnalysisUseCase, IndexerUseCase, LanceDbVectorRepository, OrtEmbedding,
    OrtReranking, ProgressObserver, QueryExpander, RerankingService, RuleBasedQueryExpander, SearchCodeUseCase,
    SemanticEmbedder, SqliteAstGraphRepository, SymbolContextUseCase, TreeSitterParser, VectorRepository,
};

#[derive(Parser)]
#[command(name = "codeintel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path inside the repository to operate on (defaults to the current directory).
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the repository (full by default, or from a change list).
    Index {
        /// Diff the working tree (or the index, with --staged) against `meta.json`
        /// instead of walking every file.
        #[arg(long)]
        incremental: bool,

        /// With --incremental, diff the Git index instead of the working tree.
        #[arg(long)]
        staged: bool,
    },

    /// Adaptive retrieval search over the indexed repository.
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Blast-radius analysis: every symbol that transitively calls `symbol`.
    Impact {
        symbol: String,

        #[arg(short, long, default_value = "5")]
        depth: usize,
    },

    /// 360-degree caller/callee view of a symbol.
    Context {
        symbol: String,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Top files and symbols by PageRank over the call graph.
    Map {
        #[arg(long = "files", default_value = "20")]
        top_files: usize,

        #[arg(long = "symbols-per-file", default_value = "5")]
        top_symbols_per_file: usize,
    },

    /// Generate (or print) the Deterministic Semantic Record for a commit.
    Dsr {
        /// Defaults to HEAD.
        commit: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(domain_err) = err.downcast_ref::<DomainError>() {
                eprintln!("error: {domain_err}");
                std::process::exit(domain_err.exit_code());
            }
            Err(err)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let repo_root = git_toplevel(&cli.repo).await?;
    let data_dir = repo_root.join(".git-ai");
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = load_config(&data_dir).await;

    match cli.command {
        Commands::Index { incremental, staged } => {
            let parser = Arc::new(TreeSitterParser::new());
            let embedder = build_embedder(&config);
            let (vector_repo, ann_index, ast_graph) = build_storage(&data_dir, &config).await?;
            let indexer = IndexerUseCase::new(parser, embedder, vector_repo, ann_index.clone(), ast_graph, config.clone());
            let progress = CliProgress::new();

            let meta = if incremental {
                let source = if staged { ChangeSource::Staged } else { ChangeSource::Worktree };
                let changes = compute_git_diff(&repo_root, staged).await?;
                info!(changes = changes.len(), "running incremental index");
                indexer.index_incremental(&repo_root, &changes, source, &progress).await?
            } else {
                indexer.index_full(&repo_root, &repo_root, &progress).await?
            };
            progress.finish();
            ann_index.save(&data_dir.join("hnsw.bin")).await?;

            println!("Indexed {} language(s); schema v{}.", meta.languages.len(), meta.index_schema_version);
        }

        Commands::Search { query, limit } => {
            let embedder = build_embedder(&config);
            let (vector_repo, ann_index, ast_graph) = build_storage(&data_dir, &config).await?;
            let expander: Arc<dyn QueryExpander> = Arc::new(RuleBasedQueryExpander::new());

            let mut use_case = SearchCodeUseCase::new(embedder, vector_repo, ann_index, ast_graph, expander);
            if let Some(reranker) = build_reranker() {
                use_case = use_case.with_reranking(reranker);
            }

            let hits = use_case.search(&query, limit, None).await?;
            if hits.is_empty() {
                println!("No results found.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!("{}. [{}] {} (score: {:.3})", i + 1, hit.source.as_str(), hit.id, hit.score);
                    let preview: String = hit.text.lines().take(3).map(|l| format!("   | {l}")).collect::<Vec<_>>().join("\n");
                    if !preview.is_empty() {
                        println!("{preview}");
                    }
                }
            }
        }

        Commands::Impact { symbol, depth } => {
            let ast_graph = build_ast_graph(&data_dir)?;
            let use_case = ImpactAnalysisUseCase::new(ast_graph);
            let analysis = use_case.analyze(&symbol, depth).await?;

            println!(
                "Blast radius for `{}`: {} affected symbol(s), {} hop(s) deep.",
                analysis.root_symbol, analysis.total_affected, analysis.max_depth_reached
            );
            for (i, level) in analysis.by_depth.iter().enumerate() {
                for node in level {
                    println!("  depth {}: {} ({})", i + 1, node.symbol, node.file_path);
                }
            }
        }

        Commands::Context { symbol, limit } => {
            let ast_graph = build_ast_graph(&data_dir)?;
            let use_case = SymbolContextUseCase::new(ast_graph);
            let context = use_case.get_context(&symbol, limit).await?;

            println!("{} — {} caller(s), {} callee(s)", context.symbol, context.caller_count, context.callee_count);
            println!("Callers:");
            for edge in &context.callers {
                println!("  {} ({}:{})", edge.symbol, edge.file_path, edge.line);
            }
            println!("Callees:");
            for edge in &context.callees {
                println!("  {} ({}:{})", edge.symbol, edge.file_path, edge.line);
            }
        }

        Commands::Map { top_files, top_symbols_per_file } => {
            let ast_graph = build_ast_graph(&data_dir)?;
            let nodes: Vec<SymbolNode> = ast_graph
                .all_symbol_nodes()
                .await?
                .into_iter()
                .map(|n| SymbolNode { ref_id: n.ref_id, name: n.name, file: n.file })
                .collect();
            let edges: Vec<SymbolEdge> = ast_graph
                .all_call_edges()
                .await?
                .into_iter()
                .map(|e| SymbolEdge { from: e.caller_ref_id, to: e.callee_name })
                .collect();

            let repo_map = RepoMap::new(config.pagerank_iterations_clamped(), config.pagerank_max_nodes);
            let ranked = repo_map.compute(&nodes, &edges, top_files, top_symbols_per_file);

            for file in ranked {
                println!("{}  (score {:.4})", file.file, file.score);
                for symbol in file.top_symbols {
                    println!("    {}  (rank {:.4})", symbol.name, symbol.rank);
                }
            }
        }

        Commands::Dsr { commit } => {
            let parser = Arc::new(TreeSitterParser::new());
            let use_case = DsrGeneratorUseCase::new(parser, repo_root.clone());
            let commit = match commit {
                Some(c) => c,
                None => current_commit(&repo_root).await?,
            };
            let record = use_case.generate(&commit).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

async fn load_config(data_dir: &Path) -> CodeIntelConfig {
    match tokio::fs::read_to_string(data_dir.join("config.toml")).await {
        Ok(contents) => CodeIntelConfig::from_toml_str(&contents).unwrap_or_else(|e| {
            warn!("config.toml is malformed ({e}); using defaults");
            CodeIntelConfig::default()
        }),
        Err(_) => CodeIntelConfig::default(),
    }
}

fn build_embedder(config: &CodeIntelConfig) -> Arc<dyn SemanticEmbedder> {
    match OrtEmbedding::new(None) {
        Ok(ort) => Arc::new(ort),
        Err(e) => {
            warn!("ONNX embedding model unavailable ({e}); falling back to hash embedding");
            Arc::new(HashEmbedder::with_dimensions(config.embedding_dim as usize))
        }
    }
}

fn build_reranker() -> Option<Arc<dyn RerankingService>> {
    match OrtReranking::new(None) {
        Ok(ort) => Some(Arc::new(ort)),
        Err(e) => {
            warn!("ONNX reranking model unavailable ({e}); falling back to lexical reranking");
            None
        }
    }
}

async fn build_storage(
    data_dir: &Path,
    config: &CodeIntelConfig,
) -> Result<(Arc<dyn VectorRepository>, Arc<dyn AnnIndex>, Arc<dyn AstGraphRepository>)> {
    let vector_repo: Arc<dyn VectorRepository> = Arc::new(LanceDbVectorRepository::new(&data_dir.join("lancedb")).await?);

    let ann_index: Arc<dyn AnnIndex> = Arc::new(HnswAnnIndex::new(
        HnswParams::clamped(
            config.hnsw_m_clamped(),
            config.hnsw_ef_construction_clamped(),
            config.hnsw_ef_search_clamped(),
            config.quantization_bits_clamped(),
        ),
        config.embedding_dim,
        1_000_000,
    ));
    let hnsw_path = data_dir.join("hnsw.bin");
    if hnsw_path.exists() {
        ann_index.load(&hnsw_path).await?;
    }

    let ast_graph: Arc<dyn AstGraphRepository> = Arc::new(SqliteAstGraphRepository::open(&data_dir.join("ast_graph.sqlite3"))?);

    Ok((vector_repo, ann_index, ast_graph))
}

fn build_ast_graph(data_dir: &Path) -> Result<Arc<dyn AstGraphRepository>> {
    Ok(Arc::new(SqliteAstGraphRepository::open(&data_dir.join("ast_graph.sqlite3"))?))
}

async fn git_toplevel(start: &Path) -> Result<PathBuf> {
    let output = tokio::process::Command::new("git")
        .arg("rev-parse")
        .arg("--show-toplevel")
        .current_dir(start)
        .output()
        .await?;

    if !output.status.success() {
        return Err(anyhow!(DomainError::not_a_git_repo(start.display().to_string())));
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(path))
}

async fn current_commit(repo_root: &Path) -> Result<String> {
    let output = tokio::process::Command::new("git").arg("rev-parse").arg("HEAD").current_dir(repo_root).output().await?;
    if !output.status.success() {
        return Err(anyhow!(DomainError::not_a_git_repo("HEAD not resolvable")));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Thin `indicatif` progress bar adapter satisfying `ProgressObserver`.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}").unwrap_or_else(|_| ProgressStyle::default_bar()));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

impl ProgressObserver for CliProgress {
    fn on_progress(&self, total_files: usize, processed_files: usize, current_file: &str) {
        self.bar.set_length(total_files as u64);
        self.bar.set_position(processed_files as u64);
        self.bar.set_message(current_file.to_string());
    }
}

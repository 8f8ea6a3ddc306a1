//! Fixed-size file-parsing worker pool (§4.8, §5, §9 design notes).
//!
//! Shared-nothing workers communicate over channels rather than shared
//! state: the main thread dispatches `FileTask`s and collects `FileResult`s,
//! it never parses or embeds itself, and workers never touch the storage
//! layer (§5 *Scheduling model*). Dispatch is FIFO; the idle-worker pool
//! underneath `async-channel`'s MPMC receiver behaves LIFO in practice since
//! the most recently idle worker tends to win the next `recv` race — no
//! additional bookkeeping is layered on top of that.
//!
//! Grounded in the corpus's `tokio`-channel-based background-task patterns
//! (bounded mpsc dispatch to a fixed pool, `JoinHandle`-tracked workers) —
//! specialized here to the one-parser-per-worker, bounded-in-flight
//! contract the spec mandates.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::ParserService;
use crate::domain::{AstReference, DomainError, Language, Symbol};

/// One file handed to a worker: enough to parse it without touching disk
/// more than once on the main thread.
pub struct FileTask {
    pub file_path: String,
    pub language: Language,
    pub bytes: Vec<u8>,
    reply: oneshot::Sender<FileResult>,
}

/// A worker's verdict on one file. `Err` means `ParseFailure` (§7) — the
/// caller degrades per `ParseFailureFallback` rather than treating this as
/// fatal (§9: a worker error is single-file-granularity, never pool-wide).
pub struct FileResult {
    pub file_path: String,
    pub outcome: Result<(Vec<Symbol>, Vec<AstReference>), DomainError>,
}

/// Bounded, fixed-size pool of parser workers (§4.8).
///
/// `pool_size` workers each own one `ParserService` call path; dispatch goes
/// through a bounded `mpsc` channel sized at `2 * pool_size` so the caller's
/// bounded race loop caps in-flight tasks at that figure without the pool
/// needing to track capacity itself.
pub struct WorkerPool {
    dispatch: mpsc::Sender<FileTask>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `pool_size` workers, each cloning `parser` (an `Arc`, so no
    /// parser state is shared across workers; `ParserService` implementors
    /// are `Send + Sync` but each call only ever runs on one worker task at
    /// a time per task).
    pub fn new(parser: Arc<dyn ParserService>, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let in_flight_cap = 2 * pool_size;
        let (tx, rx) = mpsc::channel::<FileTask>(in_flight_cap);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..pool_size)
            .map(|worker_id| {
                let parser = Arc::clone(&parser);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let task = {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        };
                        let Some(task) = task else {
                            debug!(worker_id, "worker pool channel closed, shutting down");
                            break;
                        };

                        let outcome = parser.parse(task.language, &task.bytes, &task.file_path);
                        let result = FileResult {
                            file_path: task.file_path.clone(),
                            outcome,
                        };

                        if task.reply.send(result).is_err() {
                            warn!(file = %task.file_path, "dispatcher dropped before result delivered");
                        }
                    }
                })
            })
            .collect();

        Self { dispatch: tx, workers }
    }

    /// Submits one file for parsing and awaits its result. Rejects
    /// (`WorkerFailure`) if the pool has been closed.
    pub async fn submit(&self, file_path: String, language: Language, bytes: Vec<u8>) -> Result<FileResult, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let task = FileTask { file_path: file_path.clone(), language, bytes, reply: reply_tx };

        self.dispatch
            .send(task)
            .await
            .map_err(|_| DomainError::worker_failure(file_path.clone(), "pool closed, task rejected"))?;

        reply_rx
            .await
            .map_err(|_| DomainError::worker_failure(file_path, "worker dropped without replying"))
    }

    /// Graceful shutdown (§5 *Cancellation & timeouts*): closes the
    /// dispatch channel so no new work is accepted, then waits for every
    /// worker to drain in-flight tasks and exit. Queued tasks that never
    /// reached a worker are rejected implicitly — their `submit` callers
    /// see a dropped `oneshot` and surface `WorkerFailure`.
    pub async fn shutdown(self) {
        drop(self.dispatch);
        for handle in self.workers {
            let _ = handle.await;
        }
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }
}

/// §4.8: below this file count, parallelism is disabled and callers should
/// process files on the calling task directly instead of spinning up a pool.
pub fn parallelism_disabled(file_count: usize, threshold: usize) -> bool {
    file_count < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SymbolKind;

    struct StubParser;

    impl ParserService for StubParser {
        fn parse(&self, language: Language, bytes: &[u8], file_path: &str) -> Result<(Vec<Symbol>, Vec<AstReference>), DomainError> {
            if bytes.is_empty() {
                return Err(DomainError::parse("empty file"));
            }
            let symbol = Symbol::new("f", SymbolKind::Function, "fn f()", 1, 1, language, file_path);
            Ok((vec![symbol], vec![]))
        }

        fn supported_languages(&self) -> Vec<Language> {
            vec![Language::Rust]
        }
    }

    #[tokio::test]
    async fn submits_and_collects_results() {
        let pool = WorkerPool::new(Arc::new(StubParser), 2);

        let result = pool
            .submit("a.rs".to_string(), Language::Rust, b"fn f() {}".to_vec())
            .await
            .unwrap();

        let (symbols, _) = result.outcome.unwrap();
        assert_eq!(symbols.len(), 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn single_file_parse_failure_is_isolated() {
        let pool = WorkerPool::new(Arc::new(StubParser), 1);

        let failed = pool.submit("bad.rs".to_string(), Language::Rust, vec![]).await.unwrap();
        assert!(failed.outcome.is_err());

        let ok = pool.submit("good.rs".to_string(), Language::Rust, b"fn g() {}".to_vec()).await.unwrap();
        assert!(ok.outcome.is_ok());

        pool.shutdown().await;
    }

    #[test]
    fn parallelism_threshold_gate() {
        assert!(parallelism_disabled(10, 50));
        assert!(!parallelism_disabled(100, 50));
    }
}

use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Language, RefRow};

/// Per-language partition store (§4.3, §2.6): `chunks(content_hash PK, text,
/// dim, scale, qvec_bytes)` and `refs(ref_id PK, content_hash, file, symbol,
/// kind, signature, start_line, end_line)`.
///
/// Write discipline: callers must `delete_refs_by_file` before inserting the
/// new refs for a file (§4.3); chunk insertion is idempotent by primary key.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Inserts a chunk if `content_hash` is not already present in this
    /// language partition. A no-op on an existing key (§3 invariant:
    /// append-only, at most one row per `content_hash`).
    async fn upsert_chunk(&self, lang: Language, chunk: &Chunk) -> Result<(), DomainError>;

    async fn get_chunk(&self, lang: Language, content_hash: &str) -> Result<Option<Chunk>, DomainError>;

    /// `DELETE FROM refs WHERE file = P`, run before `insert_refs` for `P` (§4.3).
    async fn delete_refs_by_file(&self, lang: Language, file: &str) -> Result<u64, DomainError>;

    async fn insert_refs(&self, lang: Language, refs: &[RefRow]) -> Result<(), DomainError>;

    async fn refs_by_file(&self, lang: Language, file: &str) -> Result<Vec<RefRow>, DomainError>;

    async fn chunk_count(&self, lang: Language) -> Result<u64, DomainError>;

    async fn ref_count(&self, lang: Language) -> Result<u64, DomainError>;
}

/// Approximate-nearest-neighbour index over quantized chunk vectors (§4.4
/// HNSW). Sits on top of `VectorRepository`'s content store as a sidecar
/// binary index, rebuilt from current chunks or loaded from its snapshot.
#[async_trait]
pub trait AnnIndex: Send + Sync {
    async fn insert(&self, content_hash: &str, chunk: &Chunk) -> Result<(), DomainError>;

    /// `search(q, k)`: returns `(content_hash, similarity)` pairs, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>, DomainError>;

    async fn len(&self) -> Result<usize, DomainError>;

    async fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len().await? == 0)
    }

    async fn save(&self, path: &std::path::Path) -> Result<(), DomainError>;

    async fn load(&self, path: &std::path::Path) -> Result<(), DomainError>;
}

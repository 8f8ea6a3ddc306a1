//! LanceDB-backed `VectorRepository` (§4.3): one `chunks_<lang>` and one
//! `refs_<lang>` table per `Language` partition, rooted at
//! `<repoRoot>/.git-ai/lancedb/`.
//!
//! The HNSW proximity graph searched at query time is a separate,
//! hand-rolled sidecar (`domain::hnsw`, wired in via the `AnnIndex`
//! adapter) — LanceDB here is only the content store for chunks/refs, never
//! the ANN index itself (§4.4 rationale: LanceDB's built-in index doesn't
//! produce the mandated binary snapshot format).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::array::{BinaryArray, Float32Array, StringArray, UInt32Array};
use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{Chunk, DomainError, Language, RefRow, SymbolKind};

pub struct LanceDbVectorRepository {
    db_path: PathBuf,
}

impl LanceDbVectorRepository {
    pub async fn new(data_dir: &Path) -> Result<Self, DomainError> {
        let db_path = data_dir.join("lancedb");
        tokio::fs::create_dir_all(&db_path)
            .await
            .map_err(|e| DomainError::storage(format!("failed to create LanceDB directory at {}: {}", db_path.display(), e)))?;

        let repo = Self { db_path };

        let _ = lancedb::connect(repo.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        debug!("LanceDB vector repository initialized at {:?}", repo.db_path);
        Ok(repo)
    }

    fn chunks_table(lang: Language) -> String {
        format!("chunks_{}", lang.as_str())
    }

    fn refs_table(lang: Language) -> String {
        format!("refs_{}", lang.as_str())
    }

    fn chunks_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("dim", DataType::UInt32, false),
            Field::new("scale", DataType::Float32, false),
            Field::new("qvec_bytes", DataType::Binary, false),
        ]))
    }

    fn refs_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("ref_id", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("file", DataType::Utf8, false),
            Field::new("symbol", DataType::Utf8, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("signature", DataType::Utf8, false),
            Field::new("start_line", DataType::UInt32, false),
            Field::new("end_line", DataType::UInt32, false),
        ]))
    }

    fn chunk_to_batch(chunk: &Chunk) -> Result<RecordBatch, DomainError> {
        let schema = Self::chunks_schema();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![chunk.content_hash.clone()])),
                Arc::new(StringArray::from(vec![chunk.text.clone()])),
                Arc::new(UInt32Array::from(vec![chunk.dim])),
                Arc::new(Float32Array::from(vec![chunk.scale])),
                Arc::new(BinaryArray::from_vec(vec![chunk.qvec_bytes.as_slice()])),
            ],
        )
        .map_err(|e| DomainError::storage(format!("failed to build chunk record batch: {}", e)))
    }

    fn refs_to_batch(refs: &[RefRow]) -> Result<RecordBatch, DomainError> {
        let schema = Self::refs_schema();
        let ref_ids: Vec<&str> = refs.iter().map(|r| r.ref_id.as_str()).collect();
        let content_hashes: Vec<&str> = refs.iter().map(|r| r.content_hash.as_str()).collect();
        let files: Vec<&str> = refs.iter().map(|r| r.file.as_str()).collect();
        let symbols: Vec<&str> = refs.iter().map(|r| r.symbol.as_str()).collect();
        let kinds: Vec<&str> = refs.iter().map(|r| r.kind.as_str()).collect();
        let signatures: Vec<&str> = refs.iter().map(|r| r.signature.as_str()).collect();
        let start_lines: Vec<u32> = refs.iter().map(|r| r.start_line).collect();
        let end_lines: Vec<u32> = refs.iter().map(|r| r.end_line).collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ref_ids)),
                Arc::new(StringArray::from(content_hashes)),
                Arc::new(StringArray::from(files)),
                Arc::new(StringArray::from(symbols)),
                Arc::new(StringArray::from(kinds)),
                Arc::new(StringArray::from(signatures)),
                Arc::new(UInt32Array::from(start_lines)),
                Arc::new(UInt32Array::from(end_lines)),
            ],
        )
        .map_err(|e| DomainError::storage(format!("failed to build refs record batch: {}", e)))
    }

    async fn append_batch(&self, table_name: &str, batch: RecordBatch) -> Result<(), DomainError> {
        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        let table_exists = db
            .table_names()
            .execute()
            .await
            .ok()
            .map(|names| names.contains(&table_name.to_string()))
            .unwrap_or(false);

        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);

        if table_exists {
            let table = db
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| DomainError::storage(format!("failed to open LanceDB table {}: {}", table_name, e)))?;

            table
                .add(batches)
                .execute()
                .await
                .map_err(|e| DomainError::storage(format!("failed to append to LanceDB table {}: {}", table_name, e)))?;
        } else {
            db.create_table(table_name, batches)
                .execute()
                .await
                .map_err(|e| DomainError::storage(format!("failed to create LanceDB table {}: {}", table_name, e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorRepository for LanceDbVectorRepository {
    async fn upsert_chunk(&self, lang: Language, chunk: &Chunk) -> Result<(), DomainError> {
        if self.get_chunk(lang, &chunk.content_hash).await?.is_some() {
            return Ok(());
        }

        let batch = Self::chunk_to_batch(chunk)?;
        self.append_batch(&Self::chunks_table(lang), batch).await
    }

    async fn get_chunk(&self, lang: Language, content_hash: &str) -> Result<Option<Chunk>, DomainError> {
        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        let table = match db.open_table(Self::chunks_table(lang)).execute().await {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };

        let predicate = format!("content_hash = '{}'", content_hash.replace('\'', "''"));
        let batches = table
            .query()
            .only_if(predicate)
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to query LanceDB chunk: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| DomainError::storage(format!("failed to collect LanceDB chunk rows: {}", e)))?;

        for batch in batches {
            if batch.num_rows() == 0 {
                continue;
            }
            let text_col = batch.column_by_name("text").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let dim_col = batch.column_by_name("dim").and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
            let scale_col = batch.column_by_name("scale").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            let qvec_col = batch.column_by_name("qvec_bytes").and_then(|c| c.as_any().downcast_ref::<BinaryArray>());

            if let (Some(text), Some(dim), Some(scale), Some(qvec)) = (text_col, dim_col, scale_col, qvec_col) {
                return Ok(Some(Chunk {
                    content_hash: content_hash.to_string(),
                    text: text.value(0).to_string(),
                    dim: dim.value(0),
                    scale: scale.value(0),
                    qvec_bytes: qvec.value(0).to_vec(),
                }));
            }
        }

        Ok(None)
    }

    async fn delete_refs_by_file(&self, lang: Language, file: &str) -> Result<u64, DomainError> {
        let before = self.refs_by_file(lang, file).await?.len() as u64;
        if before == 0 {
            return Ok(0);
        }

        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        if let Ok(table) = db.open_table(Self::refs_table(lang)).execute().await {
            let predicate = format!("file = '{}'", file.replace('\'', "''"));
            table
                .delete(&predicate)
                .await
                .map_err(|e| DomainError::storage(format!("failed to delete refs for {}: {}", file, e)))?;
        }

        Ok(before)
    }

    async fn insert_refs(&self, lang: Language, refs: &[RefRow]) -> Result<(), DomainError> {
        if refs.is_empty() {
            return Ok(());
        }

        let batch = Self::refs_to_batch(refs)?;
        self.append_batch(&Self::refs_table(lang), batch).await
    }

    async fn refs_by_file(&self, lang: Language, file: &str) -> Result<Vec<RefRow>, DomainError> {
        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        let table = match db.open_table(Self::refs_table(lang)).execute().await {
            Ok(t) => t,
            Err(_) => return Ok(vec![]),
        };

        let predicate = format!("file = '{}'", file.replace('\'', "''"));
        let batches = table
            .query()
            .only_if(predicate)
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to query LanceDB refs: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| DomainError::storage(format!("failed to collect LanceDB ref rows: {}", e)))?;

        let mut out = Vec::new();
        for batch in batches {
            let ref_id_col = batch.column_by_name("ref_id").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let content_hash_col = batch.column_by_name("content_hash").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let file_col = batch.column_by_name("file").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let symbol_col = batch.column_by_name("symbol").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let kind_col = batch.column_by_name("kind").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let signature_col = batch.column_by_name("signature").and_then(|c| c.as_any().downcast_ref::<StringArray>());
            let start_line_col = batch.column_by_name("start_line").and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
            let end_line_col = batch.column_by_name("end_line").and_then(|c| c.as_any().downcast_ref::<UInt32Array>());

            let (Some(ref_id), Some(content_hash), Some(file_c), Some(symbol), Some(kind), Some(signature), Some(start_line), Some(end_line)) =
                (ref_id_col, content_hash_col, file_col, symbol_col, kind_col, signature_col, start_line_col, end_line_col)
            else {
                continue;
            };

            for i in 0..batch.num_rows() {
                let kind = SymbolKind::parse(kind.value(i)).unwrap_or(SymbolKind::Document);
                out.push(RefRow::new(
                    ref_id.value(i),
                    content_hash.value(i),
                    file_c.value(i),
                    symbol.value(i),
                    kind,
                    signature.value(i),
                    start_line.value(i),
                    end_line.value(i),
                ));
            }
        }

        Ok(out)
    }

    async fn chunk_count(&self, lang: Language) -> Result<u64, DomainError> {
        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        match db.open_table(Self::chunks_table(lang)).execute().await {
            Ok(table) => Ok(table
                .count_rows(None)
                .await
                .map_err(|e| DomainError::storage(format!("failed to count chunks: {}", e)))? as u64),
            Err(_) => Ok(0),
        }
    }

    async fn ref_count(&self, lang: Language) -> Result<u64, DomainError> {
        let db = lancedb::connect(self.db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| DomainError::storage(format!("failed to connect to LanceDB: {}", e)))?;

        match db.open_table(Self::refs_table(lang)).execute().await {
            Ok(table) => Ok(table
                .count_rows(None)
                .await
                .map_err(|e| DomainError::storage(format!("failed to count refs: {}", e)))? as u64),
            Err(_) => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quantization::quantize;
    use tempfile::TempDir;

    async fn repo() -> (TempDir, LanceDbVectorRepository) {
        let dir = TempDir::new().unwrap();
        let repo = LanceDbVectorRepository::new(dir.path()).await.unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn chunk_round_trips_through_lancedb() {
        let (_dir, repo) = repo().await;
        let q = quantize(&[0.1, 0.2, 0.3, 0.4], 8);
        let chunk = Chunk::new("h1", "fn f() {}", &q);

        repo.upsert_chunk(Language::Rust, &chunk).await.unwrap();
        let fetched = repo.get_chunk(Language::Rust, "h1").await.unwrap().unwrap();

        assert_eq!(fetched.text, "fn f() {}");
        assert_eq!(fetched.dim, 4);
        assert_eq!(repo.chunk_count(Language::Rust).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn refs_replace_wholesale_per_file() {
        let (_dir, repo) = repo().await;
        let row = RefRow::new("r1", "h1", "a.rs", "f", SymbolKind::Function, "fn f()", 1, 2);

        repo.insert_refs(Language::Rust, &[row]).await.unwrap();
        assert_eq!(repo.refs_by_file(Language::Rust, "a.rs").await.unwrap().len(), 1);

        let removed = repo.delete_refs_by_file(Language::Rust, "a.rs").await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.refs_by_file(Language::Rust, "a.rs").await.unwrap().is_empty());
    }
}

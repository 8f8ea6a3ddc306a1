//! `AnnIndex` adapter wiring the hand-rolled HNSW proximity graph
//! (`domain::hnsw`) into the application-level ANN port, with save/load to
//! the versioned binary snapshot format (§4.4).

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::application::AnnIndex;
use crate::domain::hnsw::{HnswIndex, HnswParams};
use crate::domain::{Chunk, DomainError};

pub struct HnswAnnIndex {
    index: Mutex<HnswIndex>,
    bits: u8,
}

impl HnswAnnIndex {
    pub fn new(params: HnswParams, dim: u32, max_elements: usize) -> Self {
        Self {
            bits: params.bits,
            index: Mutex::new(HnswIndex::new(params, dim, max_elements)),
        }
    }
}

#[async_trait]
impl AnnIndex for HnswAnnIndex {
    async fn insert(&self, content_hash: &str, chunk: &Chunk) -> Result<(), DomainError> {
        let quantized = chunk.quantized(self.bits);
        let mut index = self.index.lock().map_err(|e| DomainError::internal(format!("HNSW index lock poisoned: {}", e)))?;
        index.insert(content_hash.to_string(), &quantized);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>, DomainError> {
        let index = self.index.lock().map_err(|e| DomainError::internal(format!("HNSW index lock poisoned: {}", e)))?;
        Ok(index.search(query, k).into_iter().map(|hit| (hit.id, hit.similarity)).collect())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let index = self.index.lock().map_err(|e| DomainError::internal(format!("HNSW index lock poisoned: {}", e)))?;
        Ok(index.len())
    }

    async fn save(&self, path: &Path) -> Result<(), DomainError> {
        let index = self.index.lock().map_err(|e| DomainError::internal(format!("HNSW index lock poisoned: {}", e)))?;
        let file = std::fs::File::create(path).map_err(|e| DomainError::storage(format!("failed to create HNSW snapshot at {}: {}", path.display(), e)))?;
        let writer = std::io::BufWriter::new(file);
        index
            .save(writer)
            .map_err(|e| DomainError::storage(format!("failed to write HNSW snapshot: {}", e)))?;
        debug!(path = %path.display(), nodes = index.len(), "saved HNSW snapshot");
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<(), DomainError> {
        let file = std::fs::File::open(path).map_err(|e| DomainError::storage(format!("failed to open HNSW snapshot at {}: {}", path.display(), e)))?;
        let reader = std::io::BufReader::new(file);
        let loaded = HnswIndex::load(reader).map_err(|e| DomainError::storage(format!("failed to read HNSW snapshot: {}", e)))?;

        let mut index = self.index.lock().map_err(|e| DomainError::internal(format!("HNSW index lock poisoned: {}", e)))?;
        *index = loaded;
        debug!(path = %path.display(), nodes = index.len(), "loaded HNSW snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quantization::quantize;
    use tempfile::TempDir;

    fn chunk_with_vector(v: &[f32]) -> Chunk {
        let q = quantize(v, 8);
        Chunk::new("h", "text", &q)
    }

    #[tokio::test]
    async fn insert_and_search_round_trips() {
        let index = HnswAnnIndex::new(HnswParams::clamped(16, 200, 64, 8), 4, 100);
        index.insert("a", &chunk_with_vector(&[1.0, 0.0, 0.0, 0.0])).await.unwrap();
        index.insert("b", &chunk_with_vector(&[0.0, 1.0, 0.0, 0.0])).await.unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].0, "a");
        assert_eq!(index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn save_then_load_preserves_search_results() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let index = HnswAnnIndex::new(HnswParams::clamped(16, 200, 64, 8), 4, 100);
        index.insert("a", &chunk_with_vector(&[1.0, 0.0, 0.0, 0.0])).await.unwrap();
        index.save(&path).await.unwrap();

        let reloaded = HnswAnnIndex::new(HnswParams::clamped(16, 200, 64, 8), 4, 100);
        reloaded.load(&path).await.unwrap();

        let hits = reloaded.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].0, "a");
    }
}

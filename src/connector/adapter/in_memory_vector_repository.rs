//! In-memory `VectorRepository` (§4.3): one `HashMap` partition per
//! `Language`, used for tests and for repositories too small to pay for a
//! LanceDB connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{Chunk, DomainError, Language, RefRow};

#[derive(Default)]
struct Partition {
    chunks: HashMap<String, Chunk>,
    refs_by_file: HashMap<String, Vec<RefRow>>,
}

pub struct InMemoryVectorRepository {
    partitions: Arc<Mutex<HashMap<Language, Partition>>>,
}

impl InMemoryVectorRepository {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn upsert_chunk(&self, lang: Language, chunk: &Chunk) -> Result<(), DomainError> {
        let mut partitions = self.partitions.lock().await;
        let partition = partitions.entry(lang).or_default();

        partition
            .chunks
            .entry(chunk.content_hash.clone())
            .or_insert_with(|| chunk.clone());

        Ok(())
    }

    async fn get_chunk(&self, lang: Language, content_hash: &str) -> Result<Option<Chunk>, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions
            .get(&lang)
            .and_then(|p| p.chunks.get(content_hash))
            .cloned())
    }

    async fn delete_refs_by_file(&self, lang: Language, file: &str) -> Result<u64, DomainError> {
        let mut partitions = self.partitions.lock().await;
        let partition = partitions.entry(lang).or_default();

        let removed = partition
            .refs_by_file
            .remove(file)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0);

        Ok(removed)
    }

    async fn insert_refs(&self, lang: Language, refs: &[RefRow]) -> Result<(), DomainError> {
        if refs.is_empty() {
            return Ok(());
        }

        let mut partitions = self.partitions.lock().await;
        let partition = partitions.entry(lang).or_default();

        for row in refs {
            partition
                .refs_by_file
                .entry(row.file.clone())
                .or_default()
                .push(row.clone());
        }

        debug!("inserted {} refs into {:?} partition", refs.len(), lang);
        Ok(())
    }

    async fn refs_by_file(&self, lang: Language, file: &str) -> Result<Vec<RefRow>, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions
            .get(&lang)
            .and_then(|p| p.refs_by_file.get(file))
            .cloned()
            .unwrap_or_default())
    }

    async fn chunk_count(&self, lang: Language) -> Result<u64, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions.get(&lang).map(|p| p.chunks.len() as u64).unwrap_or(0))
    }

    async fn ref_count(&self, lang: Language) -> Result<u64, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions
            .get(&lang)
            .map(|p| p.refs_by_file.values().map(|v| v.len() as u64).sum())
            .unwrap_or(0))
    }
}

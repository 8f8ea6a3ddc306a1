use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingConfig};

/// An opaque embedding model (§1 "Out of scope: embedding models... treated
/// as an opaque `SemanticEmbedder` with a fallback hash embedding").
/// Implementations may wrap an ONNX model or fall back to the deterministic
/// hash-projection embedder (§2.3) when no model is configured.
#[async_trait]
pub trait SemanticEmbedder: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed_text(t).await?);
        }
        Ok(out)
    }

    fn config(&self) -> &EmbeddingConfig;
}

//! Deterministic hash-projection embedder (§2.3, §1 ambient stack: "fallback
//! hash embedding"): a token-hash signed projection into a fixed dimension,
//! used whenever no ONNX model is configured (`OrtEmbedding::new` failed to
//! download, or the caller chose the zero-dependency path deliberately).
//!
//! Each token of the input is hashed independently into a dimension index
//! and a sign, and its contribution is accumulated there — the classic
//! "hashing trick" feature projection, not a single whole-text hash seeding
//! an RNG. This keeps the embedding a (lossy) function of the token
//! multiset rather than of the text's exact byte sequence, so near-duplicate
//! inputs land near each other in the unquantized float space.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::application::SemanticEmbedder;
use crate::domain::{DomainError, EmbeddingConfig};

pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            config: EmbeddingConfig::new("hash-embed-fallback".to_string(), 384, 512),
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            config: EmbeddingConfig::new("hash-embed-fallback".to_string(), dimensions, 512),
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn hash_token(token: &str, salt: u8) -> u64 {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let dim = self.config.dimensions();
        let mut vector = vec![0.0f32; dim];

        for token in Self::tokenize(text) {
            let bucket = (Self::hash_token(&token, 0) % dim as u64) as usize;
            let sign = if Self::hash_token(&token, 1) % 2 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticEmbedder for HashEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let vector = self.generate_embedding(text);
        debug!("hash-embedded {} dims for {} byte input", vector.len(), text.len());
        Ok(vector)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let service = HashEmbedder::new();

        let a = service.embed_text("hello world").await.unwrap();
        let b = service.embed_text("hello world").await.unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn honors_configured_dimensions() {
        let service = HashEmbedder::with_dimensions(128);

        let embedding = service.embed_text("test").await.unwrap();

        assert_eq!(embedding.len(), 128);
    }

    #[tokio::test]
    async fn output_is_unit_normalized() {
        let service = HashEmbedder::new();

        let embedding = service.embed_text("test").await.unwrap();
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn bag_of_tokens_is_order_invariant() {
        let service = HashEmbedder::new();

        let a = service.embed_text("hello world").await.unwrap();
        let b = service.embed_text("world hello").await.unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_tokens_usually_diverge() {
        let service = HashEmbedder::new();

        let a = service.embed_text("authenticateUser").await.unwrap();
        let b = service.embed_text("parseConfigFile").await.unwrap();

        assert_ne!(a, b);
    }
}

//! Embedder configuration (§1 ambient stack: "opaque `SemanticEmbedder`").
//!
//! Carries the fields a caller needs to size downstream buffers (`dim` for
//! quantization, the model name for logging/`meta.json`) without exposing
//! how the embedder itself is implemented.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    model_name: String,
    dimensions: usize,
    max_sequence_length: usize,
}

impl EmbeddingConfig {
    pub fn new(model_name: String, dimensions: usize, max_sequence_length: usize) -> Self {
        Self {
            model_name,
            dimensions,
            max_sequence_length,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "hash-embed-fallback".to_string(),
            dimensions: 384,
            max_sequence_length: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_config_embedding_dim() {
        assert_eq!(EmbeddingConfig::default().dimensions(), 384);
    }
}

//! Content-addressed chunk row (§2.5, §4.3, Glossary).
//!
//! A `Chunk` is the vector store's content store: one row per distinct
//! `content_hash`, append-only within and across indexing runs. Occurrences
//! of that content are tracked separately as `RefRow`s.

use serde::{Deserialize, Serialize};

use crate::domain::quantization::{self, QuantizedVector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content_hash: String,
    pub text: String,
    pub dim: u32,
    pub scale: f32,
    pub qvec_bytes: Vec<u8>,
}

impl Chunk {
    /// Builds a chunk row from raw text and its quantized embedding.
    pub fn new(content_hash: impl Into<String>, text: impl Into<String>, quantized: &QuantizedVector) -> Self {
        Self {
            content_hash: content_hash.into(),
            text: text.into(),
            dim: quantized.dim,
            scale: quantized.scale,
            qvec_bytes: quantized.q.iter().map(|&b| b as u8).collect(),
        }
    }

    /// Recovers the quantized vector this row was built from, assuming 8-bit
    /// quantization (the default bit width; see `CodeIntelConfig`). Readers
    /// needing a different bit width should reconstruct `QuantizedVector`
    /// directly from `qvec_bytes`/`scale`/`dim`.
    pub fn quantized(&self, bits: u8) -> QuantizedVector {
        QuantizedVector {
            dim: self.dim,
            bits,
            scale: self.scale,
            q: self.qvec_bytes.iter().map(|&b| b as i8).collect(),
        }
    }

    pub fn dequantize(&self) -> Vec<f32> {
        quantization::dequantize(
            &self.qvec_bytes.iter().map(|&b| b as i8).collect::<Vec<_>>(),
            self.scale,
        )
    }
}

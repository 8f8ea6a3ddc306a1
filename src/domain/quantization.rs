//! SQ8 scalar quantizer (§4.1): 8-bit (configurably 4–8) symmetric scalar
//! quantization with per-vector scale, plus cosine similarity computed in
//! dequantized float space.
//!
//! Grounded in the clamp-and-scale `i8` quantization pattern used by
//! content-fingerprinting index stores in the corpus (per-vector `scale`
//! alongside a fixed-width signed integer buffer); reimplemented here against
//! the exact bit-width / rounding rule the spec mandates rather than ported
//! verbatim.

use serde::{Deserialize, Serialize};

/// A quantized vector: `dim` components, each in `[-range, range]` where
/// `range = 2^(bits-1) - 1`, plus the `scale` needed to dequantize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedVector {
    pub dim: u32,
    pub bits: u8,
    pub scale: f32,
    pub q: Vec<i8>,
}

impl QuantizedVector {
    pub fn dequantize(&self) -> Vec<f32> {
        dequantize(&self.q, self.scale)
    }
}

fn range_for_bits(bits: u8) -> i32 {
    (1i32 << (bits - 1)) - 1
}

/// `quantize(v, bits) -> {dim, scale, q}`.
///
/// `max_abs = max|v_i|`, `range = 2^(bits-1) - 1`,
/// `scale = max_abs / range` (or `1.0` for the zero vector),
/// `q_i = clamp(round(v_i / scale), -range, range)`.
///
/// # Panics
/// Panics if `bits` is outside `[4, 8]`.
pub fn quantize(v: &[f32], bits: u8) -> QuantizedVector {
    assert!((4..=8).contains(&bits), "quantization bit width must be in [4, 8]");

    let range = range_for_bits(bits);
    let max_abs = v.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
    let scale = if max_abs == 0.0 { 1.0 } else { max_abs / range as f32 };

    let q = v
        .iter()
        .map(|x| {
            let scaled = (x / scale).round();
            scaled.clamp(-range as f32, range as f32) as i8
        })
        .collect();

    QuantizedVector {
        dim: v.len() as u32,
        bits,
        scale,
        q,
    }
}

/// Dequantizes a raw `i8` buffer given its `scale`.
pub fn dequantize(q: &[i8], scale: f32) -> Vec<f32> {
    q.iter().map(|&x| x as f32 * scale).collect()
}

/// Cosine similarity in float space. Both-zero-norm inputs yield `0.0`
/// (neither similar nor dissimilar — there is no direction to compare).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 && norm_b == 0.0 {
        return 0.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine similarity between two already-quantized vectors, via dequantization.
pub fn cosine_similarity_quantized(a: &QuantizedVector, b: &QuantizedVector) -> f32 {
    cosine_similarity(&a.dequantize(), &b.dequantize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v.to_vec()
        } else {
            v.iter().map(|x| x / norm).collect()
        }
    }

    #[test]
    fn zero_vector_quantizes_to_zero_scale_one() {
        let q = quantize(&[0.0, 0.0, 0.0], 8);
        assert_eq!(q.scale, 1.0);
        assert_eq!(q.q, vec![0, 0, 0]);
    }

    #[test]
    fn quantize_clamps_to_range() {
        let q = quantize(&[1.0, -1.0, 0.5], 8);
        assert_eq!(q.q.iter().copied().max().unwrap(), 127);
        assert_eq!(q.q.iter().copied().min().unwrap(), -127);
    }

    #[test]
    fn both_zero_norm_cosine_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn sq8_contraction_epsilon_bound() {
        // §8 universal invariant: |cosine(dequant(quant(a)), dequant(quant(b))) - cosine(a,b)| < eps(8) <= 0.02
        let a = unit(&[0.1, 0.9, -0.3, 0.2, 0.5, -0.7, 0.05, 0.15]);
        let b = unit(&[0.2, 0.8, -0.25, 0.1, 0.4, -0.6, 0.1, 0.2]);

        let true_cos = cosine_similarity(&a, &b);
        let qa = quantize(&a, 8);
        let qb = quantize(&b, 8);
        let approx_cos = cosine_similarity_quantized(&qa, &qb);

        assert!((approx_cos - true_cos).abs() <= 0.02);
    }

    #[test]
    fn lower_bit_widths_are_coarser_but_still_bounded() {
        let q4 = quantize(&[1.0, -1.0, 0.5, 0.25], 4);
        assert_eq!(q4.q.iter().copied().max().unwrap(), 7);
        assert_eq!(q4.q.iter().copied().min().unwrap(), -7);
    }
}

//! Vector math: cosine similarity and size-weighted mean pooling.

use semchunk_core::Vector;

use crate::error::ChunkingError;

/// Added to the weight sum so all-zero weights yield a zero vector.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Cosine similarity of two equal-length vectors; 0 when either has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

/// `Σ(wᵢ·vᵢ) / (Σwᵢ + ε)`. Returns `None` for empty input.
pub fn weighted_mean<V: AsRef<[f32]>>(
    vectors: &[V],
    weights: &[f32],
) -> Result<Option<Vector>, ChunkingError> {
    if vectors.len() != weights.len() {
        return Err(ChunkingError::InputMismatch(format!(
            "{} vectors but {} weights",
            vectors.len(),
            weights.len()
        )));
    }
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dims = first.as_ref().len();

    let mut sum = vec![0.0f64; dims];
    let mut total = 0.0f64;
    for (vector, &weight) in vectors.iter().zip(weights) {
        let vector = vector.as_ref();
        if vector.len() != dims {
            return Err(ChunkingError::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
        let weight = f64::from(weight);
        total += weight;
        for (acc, &x) in sum.iter_mut().zip(vector) {
            *acc += weight * f64::from(x);
        }
    }

    let denom = total + WEIGHT_EPSILON;
    Ok(Some(sum.into_iter().map(|x| (x / denom) as f32).collect()))
}

/// Incremental form of [`weighted_mean`]: fold `vector` with weight `weight`
/// into a centroid that already carries `centroid_weight`.
pub(crate) fn blend(centroid: &[f32], centroid_weight: f32, vector: &[f32], weight: f32) -> Vector {
    let (cw, w) = (f64::from(centroid_weight), f64::from(weight));
    let denom = cw + w + WEIGHT_EPSILON;
    centroid
        .iter()
        .zip(vector)
        .map(|(&c, &v)| ((cw * f64::from(c) + w * f64::from(v)) / denom) as f32)
        .collect()
}

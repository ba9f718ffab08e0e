//! Numeric primitives for embedding math.

/// Cosine similarity in [-1, 1]. Returns 0.0 for empty or mismatched inputs;
/// callers clamp downstream where a [0, 1] score is required.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Element-wise mean of the given vectors.
///
/// Empty inputs are dropped first. Among the remainder, any vector whose
/// length differs from the first valid vector's length is skipped - never
/// padded or truncated. Returns an empty vector if nothing survives.
pub fn average_vectors(vectors: &[&[f32]]) -> Vec<f32> {
    let valid: Vec<&[f32]> = vectors.iter().filter(|v| !v.is_empty()).copied().collect();

    let Some(first) = valid.first() else {
        return Vec::new();
    };

    let length = first.len();
    let mut sum = vec![0.0f32; length];
    let mut survivors = 0usize;

    for vec in &valid {
        if vec.len() != length {
            // Inconsistent dimensionality, skip this vector
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(vec.iter()) {
            *acc += value;
        }
        survivors += 1;
    }

    if survivors == 0 {
        return Vec::new();
    }

    sum.iter().map(|value| value / survivors as f32).collect()
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

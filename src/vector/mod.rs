// Vector math used to score chunks against a query


/// Cosine similarity between two embedding vectors.
///
/// Malformed input scores as 0 instead of failing, so one bad row can never
/// abort a ranking pass: empty vectors, vectors of different lengths,
/// zero-magnitude vectors and non-finite results all return 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    // f64 accumulators keep sums of squares of large components finite
    let mut dot_product = 0.0_f64;
    let mut magnitude_a = 0.0_f64;
    let mut magnitude_b = 0.0_f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot_product = x.mul_add(y, dot_product);
        magnitude_a = x.mul_add(x, magnitude_a);
        magnitude_b = y.mul_add(y, magnitude_b);
    }

    let magnitude_a = magnitude_a.sqrt();
    let magnitude_b = magnitude_b.sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = (dot_product / (magnitude_a * magnitude_b)) as f32;
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// A vector of `dimension` zeros, used in place of an embedding that could not be produced
#[inline]
pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with a precomputed query norm. `None` when the vectors
/// disagree on dimension or `b` has zero length.
pub fn cosine_with_norm(a: &[f32], a_norm: f32, b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a_norm == 0.0 {
        return None;
    }
    let b_norm = l2_norm(b);
    if b_norm == 0.0 {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Some(dot / (a_norm * b_norm))
}

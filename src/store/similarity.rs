// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brute-force cosine ranking.
//!
//! Every query is scored against every stored vector (O(N·D)). Fine at
//! single-process scale; there is no index.

use rayon::prelude::*;
use std::cmp::Ordering;

/// Below this many vectors scoring stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 2048;

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude, when the lengths
/// differ, or when the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let score = dot_product / (magnitude_a * magnitude_b);
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Scores `query` against each vector and returns the best `k` as
/// `(index, score)`, highest score first. Equal scores keep insertion order.
pub fn rank_top_k<'a, I>(query: &[f32], vectors: I, k: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
    I::IntoIter: ExactSizeIterator,
{
    let vectors = vectors.into_iter();
    if k == 0 || vectors.len() == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = if vectors.len() >= PARALLEL_THRESHOLD {
        let collected: Vec<&[f32]> = vectors.collect();
        collected
            .par_iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect()
    } else {
        vectors
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect()
    };

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
        rank_top_k(query, vectors.iter().map(Vec::as_slice), k)
    }

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_descending() {
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.9, 0.1]];
        let ranked = rank(&[1.0, 0.0], &vectors, 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let vectors = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![1.0, 0.0],
        ];
        let ranked = rank(&[1.0, 0.0], &vectors, 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_limits() {
        let vectors = vec![vec![1.0], vec![1.0]];
        assert!(rank(&[1.0], &vectors, 0).is_empty());
        assert_eq!(rank(&[1.0], &vectors, 10).len(), 2);
        assert!(rank(&[1.0], &[], 3).is_empty());
    }

    #[test]
    fn test_parallel_path_matches_sequential_order() {
        let vectors: Vec<Vec<f32>> = (0..PARALLEL_THRESHOLD + 10)
            .map(|i| vec![(i % 7) as f32, 1.0])
            .collect();
        let ranked = rank(&[1.0, 0.0], &vectors, 5);
        // Highest score belongs to i % 7 == 6; ties resolved by index.
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![6, 13, 20, 27, 34]);
    }
}

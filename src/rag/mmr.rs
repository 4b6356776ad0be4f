//! Maximal marginal relevance.
//!
//! Picks `k` candidates maximizing
//! `λ * sim(query, c) - (1 - λ) * max sim(c, already_selected)`,
//! starting from the candidate most similar to the query.

use crate::vector_math::cosine_similarity;

/// Indices into `candidates`, in selection order.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let query_similarity: Vec<f32> = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect();

    let mut best_first = 0;
    for (idx, score) in query_similarity.iter().enumerate() {
        if *score > query_similarity[best_first] {
            best_first = idx;
        }
    }

    let mut selected = vec![best_first];
    while selected.len() < k.min(candidates.len()) {
        let mut best_idx = None;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, candidate) in candidates.iter().enumerate() {
            if selected.contains(&idx) {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&sel| cosine_similarity(candidate, &candidates[sel]))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda_mult * query_similarity[idx] - (1.0 - lambda_mult) * redundancy;

            if score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        match best_idx {
            Some(idx) => selected.push(idx),
            None => break,
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pick_is_most_similar() {
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![0.5, 0.5]];
        let picked = maximal_marginal_relevance(&[1.0, 0.0], &candidates, 1, 0.5);
        assert_eq!(picked, vec![1]);
    }

    #[test]
    fn low_lambda_prefers_diversity() {
        let candidates = vec![vec![1.0, 0.0], vec![1.0, -0.05], vec![0.3, 1.0]];

        let diverse = maximal_marginal_relevance(&[1.0, 0.2], &candidates, 2, 0.3);
        assert_eq!(diverse, vec![0, 2]);

        let relevant = maximal_marginal_relevance(&[1.0, 0.2], &candidates, 2, 1.0);
        assert_eq!(relevant, vec![0, 1]);
    }

    #[test]
    fn k_is_capped_by_candidates() {
        let candidates = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 5, 0.5).len(), 2);
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 0, 0.5).is_empty());
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &[], 2, 0.5).is_empty());
    }
}

//! Pairwise cosine similarity mining and banding.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::tfidf::SparseVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SimilarityBand {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
}

impl SimilarityBand {
    pub const ALL: [SimilarityBand; 4] = [Self::VeryHigh, Self::High, Self::Medium, Self::Low];

    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Self::VeryHigh
        } else if score > 0.5 {
            Self::High
        } else if score > 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// A pair stored once with `index1 < index2` (corpus order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPair {
    pub index1: usize,
    pub index2: usize,
    pub project1_id: String,
    pub project2_id: String,
    pub score: f64,
}

impl SimilarPair {
    pub fn band(&self) -> SimilarityBand {
        SimilarityBand::from_score(self.score)
    }
}

/// Cosine similarity of two vectors; zero vectors score 0 against everything.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    if a.is_zero() || b.is_zero() {
        return 0.0;
    }
    let denominator = a.norm() * b.norm();
    if denominator == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(0.0, 1.0)
}

/// Emits every pair with `score > threshold`, sorted by score descending and
/// then by `(index1, index2)` ascending.
pub fn mine_similar_pairs(
    project_ids: &[String],
    vectors: &[SparseVector],
    threshold: f64,
    cancel: &CancelToken,
) -> Result<Vec<SimilarPair>> {
    let mut pairs = Vec::new();
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            cancel.check()?;
            let score = cosine_similarity(&vectors[i], &vectors[j]);
            if score > threshold {
                pairs.push(SimilarPair {
                    index1: i,
                    index2: j,
                    project1_id: project_ids[i].clone(),
                    project2_id: project_ids[j].clone(),
                    score,
                });
            }
        }
    }

    pairs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.index1.cmp(&b.index1))
            .then(a.index2.cmp(&b.index2))
    });
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("P{i}")).collect()
    }

    #[test]
    fn bands_use_strict_thresholds() {
        assert_eq!(SimilarityBand::from_score(0.71), SimilarityBand::VeryHigh);
        assert_eq!(SimilarityBand::from_score(0.7), SimilarityBand::High);
        assert_eq!(SimilarityBand::from_score(0.5), SimilarityBand::Medium);
        assert_eq!(SimilarityBand::from_score(0.3), SimilarityBand::Low);
    }

    #[test]
    fn threshold_is_strict() {
        let a = SparseVector::from_entries(vec![(0, 1.0)]);
        let b = SparseVector::from_entries(vec![(0, 0.3), (1, (1.0f64 - 0.09).sqrt())]);
        let score = cosine_similarity(&a, &b);
        let pairs =
            mine_similar_pairs(&ids(2), &[a.clone(), b.clone()], score, &CancelToken::new())
                .unwrap();
        assert!(pairs.is_empty());
        let pairs = mine_similar_pairs(&ids(2), &[a, b], score - 1e-6, &CancelToken::new())
            .unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn pairs_sorted_by_score_then_index() {
        let x = SparseVector::from_entries(vec![(0, 1.0)]);
        let y = SparseVector::from_entries(vec![(1, 1.0)]);
        let vectors = vec![x.clone(), y.clone(), x, y];
        let pairs = mine_similar_pairs(&ids(4), &vectors, 0.3, &CancelToken::new()).unwrap();
        let order: Vec<(usize, usize)> = pairs.iter().map(|p| (p.index1, p.index2)).collect();
        assert_eq!(order, vec![(0, 2), (1, 3)]);
        assert_eq!(pairs[0].band(), SimilarityBand::VeryHigh);
    }

    #[test]
    fn zero_vectors_never_pair() {
        let zero = SparseVector::default();
        let x = SparseVector::from_entries(vec![(0, 1.0)]);
        assert_eq!(cosine_similarity(&zero, &x), 0.0);
        let pairs =
            mine_similar_pairs(&ids(2), &[zero.clone(), zero], 0.0, &CancelToken::new()).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn cancellation_stops_mining() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let x = SparseVector::from_entries(vec![(0, 1.0)]);
        assert!(mine_similar_pairs(&ids(2), &[x.clone(), x], 0.3, &cancel).is_err());
    }
}

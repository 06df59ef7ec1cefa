//! TF-IDF vectorizer producing L2-normalized sparse vectors.
//!
//! Vocabulary selection keeps terms within the document-frequency bounds,
//! ranks them by total corpus frequency and truncates to `max_features`.
//! Ties in that ranking keep the order in which terms were first seen while
//! traversing the corpus (document order, then token order), so the column
//! layout is reproducible across runs.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::VectorizerConfig;
use crate::error::Result;
use crate::text::tokenize;

/// Sparse vector stored as `(column, weight)` pairs sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn from_entries(mut entries: Vec<(usize, f64)>) -> Self {
        entries.retain(|(_, weight)| *weight != 0.0);
        entries.sort_by_key(|(column, _)| *column);
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, weight)| weight * weight)
            .sum::<f64>()
            .sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_col, a_weight) = self.entries[i];
            let (b_col, b_weight) = other.entries[j];
            match a_col.cmp(&b_col) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_weight * b_weight;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

#[derive(Debug, Default)]
struct TermTally {
    document_frequency: usize,
    corpus_frequency: usize,
}

/// Fitted vocabulary and IDF table. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfModel {
    vocabulary: IndexMap<String, usize>,
    idf: IndexMap<String, f64>,
    document_count: usize,
}

impl TfidfModel {
    /// Fits the vocabulary over `documents`.
    pub fn fit<S: AsRef<str>>(
        documents: &[S],
        config: &VectorizerConfig,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let document_count = documents.len();
        let mut tallies: IndexMap<String, TermTally> = IndexMap::new();

        for document in documents {
            cancel.check()?;
            let tokens = tokenize(document.as_ref());
            let mut seen: HashSet<&str> = HashSet::new();
            for token in &tokens {
                let tally = tallies.entry(token.clone()).or_default();
                tally.corpus_frequency += 1;
                if seen.insert(token.as_str()) {
                    tally.document_frequency += 1;
                }
            }
        }

        let total = document_count as f64;
        let mut candidates: Vec<(&String, &TermTally)> = tallies
            .iter()
            .filter(|(_, tally)| {
                tally.document_frequency >= config.min_df
                    && tally.document_frequency as f64 / total <= config.max_df
            })
            .collect();
        // Stable sort: equal frequencies keep first-seen order.
        candidates.sort_by(|a, b| b.1.corpus_frequency.cmp(&a.1.corpus_frequency));
        candidates.truncate(config.max_features);

        let mut vocabulary = IndexMap::with_capacity(candidates.len());
        let mut idf = IndexMap::with_capacity(candidates.len());
        for (column, (term, tally)) in candidates.into_iter().enumerate() {
            vocabulary.insert(term.clone(), column);
            idf.insert(
                term.clone(),
                (total / tally.document_frequency as f64).ln(),
            );
        }

        debug!(
            terms_seen = tallies.len(),
            vocabulary = vocabulary.len(),
            documents = document_count,
            "fitted TF-IDF vocabulary"
        );

        Ok(Self {
            vocabulary,
            idf,
            document_count,
        })
    }

    pub fn vocabulary(&self) -> &IndexMap<String, usize> {
        &self.vocabulary
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Vectorizes a single document.
    pub fn transform_one(&self, document: &str) -> SparseVector {
        let mut counts: IndexMap<usize, f64> = IndexMap::new();
        for token in tokenize(document) {
            if let Some(&column) = self.vocabulary.get(&token) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(column, count)| {
                // `idf` is inserted in column order alongside `vocabulary`.
                let idf = self.idf.get_index(column).map_or(0.0, |(_, idf)| *idf);
                (column, count * idf)
            })
            .collect();

        let mut vector = SparseVector::from_entries(weighted);
        let norm = vector.norm();
        if norm > 0.0 {
            for (_, weight) in vector.entries.iter_mut() {
                *weight /= norm;
            }
        }
        vector
    }

    /// Vectorizes every document, preserving input order.
    pub fn transform<S: AsRef<str>>(
        &self,
        documents: &[S],
        cancel: &CancelToken,
    ) -> Result<Vec<SparseVector>> {
        documents
            .iter()
            .map(|document| {
                cancel.check()?;
                Ok(self.transform_one(document.as_ref()))
            })
            .collect()
    }
}

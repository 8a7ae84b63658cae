// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! TF-IDF vectorization of cleaned article text

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sparse feature vector, entries sorted by feature index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn new(mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_by_key(|(idx, _)| *idx);
        Self { entries }
    }

    /// Value of a feature (zero when absent)
    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(i, v)| weights.get(*i).map(|w| w * v))
            .sum()
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rows of sparse features with a fixed dimensionality
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    pub rows: Vec<SparseVector>,
    pub n_features: usize,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<SparseVector>, n_features: usize) -> Self {
        Self { rows, n_features }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Matrix made of the selected rows
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            n_features: self.n_features,
        }
    }
}

/// Vectorizer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerParams {
    /// Vocabulary size cap (most frequent terms are kept)
    pub max_features: Option<usize>,
    /// Smallest and largest n-gram length
    pub ngram_range: (usize, usize),
    /// Minimum number of documents a term must appear in
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in
    pub max_df: f64,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            max_features: Some(5000),
            ngram_range: (1, 2),
            min_df: 2,
            max_df: 0.95,
        }
    }
}

/// TF-IDF vectorizer with smoothed IDF and L2-normalized rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    params: VectorizerParams,
    /// Term -> feature index
    vocabulary: BTreeMap<String, usize>,
    /// Inverse document frequency per feature index
    idf: Vec<f64>,
    n_documents: usize,
}

impl TfidfVectorizer {
    pub fn new(params: VectorizerParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Split a cleaned document into its n-gram terms
    fn terms(&self, document: &str) -> Vec<String> {
        let tokens: Vec<&str> = document.split_whitespace().collect();
        let (min_n, max_n) = self.params.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n.max(min_n) {
            if n > tokens.len() {
                break;
            }
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }

    /// Learn the vocabulary and IDF weights from cleaned documents
    pub fn fit(&mut self, documents: &[&str]) {
        let n_docs = documents.len();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut term_frequency: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.terms(doc);
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let max_df = (self.params.max_df * n_docs as f64).floor().max(1.0) as usize;
        let mut candidates: Vec<(&String, usize)> = document_frequency
            .iter()
            .filter(|(_, df)| **df >= self.params.min_df && **df <= max_df)
            .map(|(term, _)| (term, term_frequency[term]))
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if let Some(cap) = self.params.max_features {
            candidates.truncate(cap);
        }

        let mut terms: Vec<&String> = candidates.into_iter().map(|(t, _)| t).collect();
        terms.sort();

        self.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| ((*term).clone(), idx))
            .collect();
        self.idf = terms
            .iter()
            .map(|term| {
                let df = document_frequency[*term] as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.n_documents = n_docs;

        tracing::debug!(
            "Fitted TF-IDF vocabulary: {} terms from {} documents",
            self.vocabulary.len(),
            n_docs
        );
    }

    /// Transform one cleaned document into a TF-IDF vector
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.terms(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, count)| (idx, count * self.idf[idx]))
            .collect();

        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut entries {
                *v /= norm;
            }
        }
        SparseVector::new(entries)
    }

    pub fn transform_all(&self, documents: &[&str]) -> FeatureMatrix {
        FeatureMatrix::new(
            documents.iter().map(|d| self.transform(d)).collect(),
            self.vocabulary.len(),
        )
    }

    pub fn fit_transform(&mut self, documents: &[&str]) -> FeatureMatrix {
        self.fit(documents);
        self.transform_all(documents)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }

    /// Term for a feature index
    pub fn term(&self, index: usize) -> Option<&str> {
        self.vocabulary
            .iter()
            .find(|(_, &i)| i == index)
            .map(|(t, _)| t.as_str())
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }
}

//! TF-IDF vectorization and cosine similarity.
//!
//! Tokens are lowercase runs of two or more word characters. Each document is
//! represented by raw term counts weighted with a smoothed inverse document
//! frequency `ln((1 + n) / (1 + df)) + 1` and normalized to unit length, so a
//! dot product is the cosine similarity.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::MatchError;

lazy_static! {
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"\b\w\w+\b").expect("Token pattern should be valid");
}

/// Vectorizer settings
#[derive(Debug, Clone)]
pub struct TfIdfConfig {
    /// Terms present in more than this fraction of documents are dropped
    pub max_df: f64,
    /// Smallest n-gram length (in tokens)
    pub min_ngram: usize,
    /// Largest n-gram length (in tokens)
    pub max_ngram: usize,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        Self {
            max_df: 0.85,
            min_ngram: 1,
            max_ngram: 2,
        }
    }
}

type SparseVector = HashMap<usize, f64>;

/// Fitted TF-IDF model over a fixed document set
#[derive(Debug, Clone)]
pub struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    documents: Vec<SparseVector>,
    min_ngram: usize,
    max_ngram: usize,
}

/// Lowercase word tokens of length two or more
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_REGEX
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ngrams(tokens: &[String], min_n: usize, max_n: usize) -> Vec<String> {
    let mut terms = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

fn normalize(vector: &mut SparseVector) {
    let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in vector.values_mut() {
            *value /= norm;
        }
    }
}

impl TfIdfIndex {
    /// Fit the vocabulary and document vectors.
    ///
    /// Fails when the corpus is too small for `max_df` pruning to keep any
    /// term, or when no terms survive tokenization and pruning.
    pub fn fit(documents: &[&str], config: &TfIdfConfig) -> Result<Self, MatchError> {
        if documents.is_empty() {
            return Err(MatchError::NoCandidates);
        }

        let n_docs = documents.len();
        let max_doc_count = config.max_df * n_docs as f64;
        if max_doc_count < 1.0 {
            return Err(MatchError::DegenerateCorpus(format!(
                "max_df={} keeps no term for {} document(s)",
                config.max_df, n_docs
            )));
        }

        let term_lists: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| ngrams(&tokenize(doc), config.min_ngram, config.max_ngram))
            .collect();

        // Document frequency in first-seen order so indices are deterministic
        let mut order: Vec<String> = Vec::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for terms in &term_lists {
            let mut seen = std::collections::HashSet::new();
            for term in terms {
                if seen.insert(term.as_str()) {
                    let entry = document_frequency.entry(term.clone()).or_insert_with(|| {
                        order.push(term.clone());
                        0
                    });
                    *entry += 1;
                }
            }
        }

        if order.is_empty() {
            return Err(MatchError::EmptyVocabulary);
        }

        let mut vocabulary = HashMap::new();
        let mut idf = Vec::new();
        for term in order {
            let df = document_frequency[&term];
            if df as f64 > max_doc_count {
                continue;
            }
            idf.push(((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, idf.len() - 1);
        }

        if vocabulary.is_empty() {
            return Err(MatchError::EmptyVocabulary);
        }

        let mut index = Self {
            vocabulary,
            idf,
            documents: Vec::with_capacity(n_docs),
            min_ngram: config.min_ngram,
            max_ngram: config.max_ngram,
        };
        let documents: Vec<SparseVector> =
            term_lists.iter().map(|terms| index.vectorize(terms)).collect();
        index.documents = documents;
        Ok(index)
    }

    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut vector = SparseVector::new();
        for term in terms {
            if let Some(&idx) = self.vocabulary.get(term) {
                *vector.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        for (idx, value) in vector.iter_mut() {
            *value *= self.idf[*idx];
        }
        normalize(&mut vector);
        vector
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Cosine similarity of `query` against every document, in document order
    pub fn similarities(&self, query: &str) -> Vec<f64> {
        let terms = ngrams(&tokenize(query), self.min_ngram, self.max_ngram);
        let query_vector = self.vectorize(&terms);

        self.documents
            .iter()
            .map(|doc| {
                let dot: f64 = query_vector
                    .iter()
                    .filter_map(|(idx, q)| doc.get(idx).map(|d| q * d))
                    .sum();
                dot.clamp(0.0, 1.0)
            })
            .collect()
    }
}

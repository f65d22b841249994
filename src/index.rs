//! BM25 lexical index over an immutable corpus snapshot.
//!
//! [`IndexSnapshot`] bundles the documents of one corpus read together with
//! the term statistics computed from exactly that read, so scoring can never
//! mix documents from one snapshot with statistics from another. Snapshots
//! are immutable once built and are shared read-only across concurrent
//! retrievals; [`IndexSnapshot::score`] is a pure function of the snapshot
//! and the query terms.

use std::collections::HashMap;

use crate::models::CorpusDocument;
use crate::tokenize::Tokenizer;

/// BM25 tuning constants. The defaults are conventional; only the
/// monotonicity of the resulting scores is load-bearing.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Term frequency of one term within one document.
#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    tf: u32,
}

/// One fully built, immutable version of the index plus the documents it
/// was built from.
pub struct IndexSnapshot {
    documents: Vec<CorpusDocument>,
    postings: HashMap<String, Vec<Posting>>,
    doc_len: Vec<usize>,
    avg_doc_len: f64,
    params: Bm25Params,
}

impl IndexSnapshot {
    /// Tokenize every document and accumulate term statistics.
    ///
    /// An empty corpus produces a valid snapshot that scores every query
    /// as all-empty rather than failing.
    pub fn build(
        documents: Vec<CorpusDocument>,
        tokenizer: &dyn Tokenizer,
        params: Bm25Params,
    ) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_len = Vec::with_capacity(documents.len());

        for (doc, document) in documents.iter().enumerate() {
            let terms = tokenizer.tokenize(&document.text);
            doc_len.push(terms.len());

            let mut tf: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *tf.entry(term).or_insert(0) += 1;
            }
            for (term, count) in tf {
                postings
                    .entry(term)
                    .or_default()
                    .push(Posting { doc, tf: count });
            }
        }

        let avg_doc_len = if doc_len.is_empty() {
            0.0
        } else {
            doc_len.iter().sum::<usize>() as f64 / doc_len.len() as f64
        };

        Self {
            documents,
            postings,
            doc_len,
            avg_doc_len,
            params,
        }
    }

    /// A snapshot over zero documents.
    pub fn empty(params: Bm25Params) -> Self {
        Self::build(Vec::new(), &crate::tokenize::SyllableTokenizer, params)
    }

    pub fn documents(&self) -> &[CorpusDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Score every document in the snapshot against `query_terms`.
    ///
    /// Returns one score per document, aligned to [`Self::documents`] order.
    /// Scores increase with term frequency (saturating via `k1`), with term
    /// rarity (smoothed non-negative IDF), and are normalized against
    /// document length relative to the corpus average (`b`).
    pub fn score(&self, query_terms: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0f64; self.documents.len()];
        if self.documents.is_empty() || query_terms.is_empty() {
            return scores;
        }

        let n = self.documents.len() as f64;
        let avg = self.avg_doc_len.max(1.0);
        let k1 = self.params.k1;
        let b = self.params.b;

        for term in query_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for p in postings {
                let tf = f64::from(p.tf);
                let dl = self.doc_len[p.doc] as f64;
                let denom = tf + k1 * (1.0 - b + b * dl / avg);
                scores[p.doc] += idf * tf * (k1 + 1.0) / denom;
            }
        }

        scores
    }
}

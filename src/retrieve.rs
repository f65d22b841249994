//! Top-k retrieval against an index snapshot.

use crate::index::IndexSnapshot;
use crate::models::RetrievalHit;
use crate::tokenize::Tokenizer;

/// Retrieve the `k` highest-scoring documents for `query`.
///
/// Results are sorted descending by score; ties keep ascending original
/// corpus order, so ranking is deterministic. An empty corpus or a query
/// that tokenizes to no terms yields an empty result, not an error —
/// downstream prompt assembly tolerates an empty context.
pub fn retrieve(
    snapshot: &IndexSnapshot,
    tokenizer: &dyn Tokenizer,
    query: &str,
    k: usize,
) -> Vec<RetrievalHit> {
    if snapshot.is_empty() || k == 0 {
        return Vec::new();
    }

    let query_terms = tokenizer.tokenize(query);
    if query_terms.is_empty() {
        return Vec::new();
    }

    let scores = snapshot.score(&query_terms);

    let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
    // Sort: score desc, original index asc (deterministic)
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(k);

    ranked
        .into_iter()
        .map(|(idx, score)| RetrievalHit {
            document: snapshot.documents()[idx].clone(),
            score,
        })
        .collect()
}

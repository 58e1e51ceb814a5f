//! Per-source hybrid retrieval and the source aggregator.

use std::collections::HashMap;

use tracing::debug;

use creditdb_core::traits::{DenseIndex, LexicalIndex};
use creditdb_core::types::{
    renumber, sort_by_score_desc, Chunk, IndexHit, RetrievalMethod, SearchResult,
};

use crate::diagnostics::{Degradation, DiagnosticSink, Modality, Stage};
use crate::fusion::{rrf, weighted_fusion};
use crate::options::{FusionMethod, SearchOptions};

/// Everything loaded for one named source. Immutable once built.
pub struct SourceIndex {
    pub name: String,
    pub chunks: Vec<Chunk>,
    pub dense: Option<Box<dyn DenseIndex>>,
    pub lexical: Option<Box<dyn LexicalIndex>>,
}

impl SourceIndex {
    pub fn new(name: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            name: name.into(),
            chunks,
            dense: None,
            lexical: None,
        }
    }

    pub fn with_dense(mut self, index: Box<dyn DenseIndex>) -> Self {
        self.dense = Some(index);
        self
    }

    pub fn with_lexical(mut self, index: Box<dyn LexicalIndex>) -> Self {
        self.lexical = Some(index);
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn to_results(
        &self,
        hits: Vec<IndexHit>,
        query: &str,
        method: RetrievalMethod,
    ) -> Vec<SearchResult> {
        hits.into_iter()
            .filter(|h| method != RetrievalMethod::Lexical || h.score > 0.0)
            .filter_map(|h| {
                let idx = usize::try_from(h.id).ok()?;
                self.chunks.get(idx).map(|chunk| (chunk, h.score))
            })
            .enumerate()
            .map(|(i, (chunk, score))| {
                let score = f64::from(score);
                SearchResult::from_chunk(chunk, &self.name, query, method, i + 1, score)
            })
            .collect()
    }
}

/// Hits requested from each index for a retrieval of `k` results.
pub fn fetch_size(k: usize, opts: &SearchOptions) -> usize {
    k.saturating_mul(3).min(opts.max_candidates).max(1)
}

/// Retrieve the top `k` results for one sub-query from one source.
///
/// `query_vec` is `None` when the query could not be embedded; the source
/// then answers from its lexical index alone. Index failures are reported as
/// [`Degradation::DegradedHybrid`] and the surviving modality is used.
pub fn retrieve(
    source: &SourceIndex,
    query: &str,
    query_vec: Option<&[f32]>,
    k: usize,
    opts: &SearchOptions,
    sink: &dyn DiagnosticSink,
) -> Vec<SearchResult> {
    if k == 0 {
        return Vec::new();
    }
    let fetch = fetch_size(k, opts);

    let dense = match (source.dense.as_deref(), query_vec) {
        (Some(index), Some(vec)) => match index.search(vec, fetch) {
            Ok(hits) => Some(source.to_results(hits, query, RetrievalMethod::Dense)),
            Err(e) => {
                sink.report(
                    Stage::Retrieval,
                    &Degradation::DegradedHybrid {
                        name: source.name.clone(),
                        lost: Modality::Dense,
                        cause: format!("{e:#}"),
                    },
                );
                None
            }
        },
        _ => None,
    };

    // Lexical search runs for hybrid requests, and as the fallback when the
    // dense side produced nothing usable.
    let want_lexical = opts.use_hybrid || dense.is_none();
    let lexical = match source.lexical.as_deref() {
        Some(index) if want_lexical => match index.search(query, fetch) {
            Ok(hits) => Some(source.to_results(hits, query, RetrievalMethod::Lexical)),
            Err(e) => {
                sink.report(
                    Stage::Retrieval,
                    &Degradation::DegradedHybrid {
                        name: source.name.clone(),
                        lost: Modality::Lexical,
                        cause: format!("{e:#}"),
                    },
                );
                None
            }
        },
        _ => None,
    };

    let mut results = match (dense, lexical) {
        (Some(d), Some(l)) if !d.is_empty() && !l.is_empty() => match opts.fusion_method {
            FusionMethod::Weighted => weighted_fusion(d, l, opts.weights()),
            FusionMethod::Rrf => rrf_pair(d, l, opts.rrf_k),
        },
        (Some(d), Some(l)) if d.is_empty() => l,
        (Some(d), _) => d,
        (None, Some(l)) => l,
        (None, None) => Vec::new(),
    };
    results.truncate(k);
    debug!(source = %source.name, query, results = results.len(), "retrieved");
    results
}

/// RRF over a dense and a lexical list, carrying both raw scores through.
fn rrf_pair(dense: Vec<SearchResult>, lexical: Vec<SearchResult>, k: u32) -> Vec<SearchResult> {
    let dense_scores: HashMap<String, f64> = dense
        .iter()
        .map(|r| (r.identity_key(), r.score))
        .collect();
    let lexical_scores: HashMap<String, f64> = lexical
        .iter()
        .map(|r| (r.identity_key(), r.score))
        .collect();

    let mut fused = rrf(vec![dense, lexical], k);
    for r in &mut fused {
        let key = r.identity_key();
        let d = dense_scores.get(&key).copied();
        let l = lexical_scores.get(&key).copied();
        r.metadata.method = match (d, l) {
            (Some(_), Some(_)) => RetrievalMethod::Hybrid,
            (Some(_), None) => RetrievalMethod::Dense,
            _ => RetrievalMethod::Lexical,
        };
        r.signals.dense = d;
        r.signals.lexical = l;
        r.signals.hybrid = Some(r.score);
        r.signals.evidence = d.or(l).unwrap_or(0.0);
    }
    fused
}

/// Concatenate per-source lists for one sub-query and rank them together.
pub fn aggregate(per_source: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut all: Vec<SearchResult> = per_source.into_iter().flatten().collect();
    sort_by_score_desc(&mut all);
    renumber(&mut all);
    all
}

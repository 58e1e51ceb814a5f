//! Confidence floor and final top-k assembly.

use tracing::debug;

use creditdb_core::types::{renumber, sort_by_score_desc, SearchResult};

use crate::diagnostics::{Degradation, DiagnosticSink, Stage};

/// Keep results whose evidence reaches `floor`.
///
/// If nothing survives, the first `fallback_n` unfiltered results are kept
/// instead and [`Degradation::EmptyAfterFiltering`] is reported. Empty input
/// stays empty.
pub fn apply_floor(
    results: Vec<SearchResult>,
    floor: f64,
    fallback_n: usize,
    sink: &dyn DiagnosticSink,
) -> Vec<SearchResult> {
    if results.is_empty() {
        return results;
    }
    let candidates = results.len();
    let passing = results
        .iter()
        .filter(|r| r.signals.evidence >= floor)
        .count();

    let mut kept: Vec<SearchResult> = if passing == 0 {
        let kept = fallback_n.min(candidates);
        sink.report(
            Stage::Filtering,
            &Degradation::EmptyAfterFiltering {
                floor,
                candidates,
                kept,
            },
        );
        results.into_iter().take(kept).collect()
    } else {
        results
            .into_iter()
            .filter(|r| r.signals.evidence >= floor)
            .collect()
    };
    debug!(floor, candidates, kept = kept.len(), "applied score floor");
    renumber(&mut kept);
    kept
}

/// Sort by score, cut to `k` and assign ranks `1..=k`.
pub fn finalize(mut results: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    sort_by_score_desc(&mut results);
    results.truncate(k);
    renumber(&mut results);
    results
}

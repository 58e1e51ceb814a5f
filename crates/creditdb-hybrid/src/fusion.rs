//! Score fusion: reciprocal rank fusion across any number of ranked lists,
//! and weighted-linear fusion of one dense and one lexical list.

use std::collections::HashMap;

use creditdb_core::types::{renumber, sort_by_score_desc, RetrievalMethod, SearchResult};

use crate::options::FusionWeights;

pub const DEFAULT_RRF_K: u32 = 60;

struct RrfEntry {
    representative: SearchResult,
    /// Score the representative carried before fusion.
    original_score: f64,
    fused: f64,
    evidence: f64,
}

/// Reciprocal rank fusion.
///
/// Each result at 1-based position `r` contributes `1 / (k + r)` to its
/// identity key. The first occurrence of a key is its representative unless a
/// later one has a strictly higher original score. A single list is returned
/// unchanged.
pub fn rrf(mut lists: Vec<Vec<SearchResult>>, k: u32) -> Vec<SearchResult> {
    match lists.len() {
        0 => return Vec::new(),
        1 => return lists.pop().unwrap_or_default(),
        _ => {}
    }

    let k = f64::from(k);
    let mut order: Vec<String> = Vec::new();
    let mut entries: HashMap<String, RrfEntry> = HashMap::new();

    for list in lists {
        for (pos, result) in list.into_iter().enumerate() {
            let contribution = 1.0 / (k + (pos + 1) as f64);
            let key = result.identity_key();
            match entries.get_mut(&key) {
                Some(entry) => {
                    entry.fused += contribution;
                    entry.evidence = entry.evidence.max(result.signals.evidence);
                    if result.score > entry.original_score {
                        entry.original_score = result.score;
                        entry.representative = result;
                    }
                }
                None => {
                    order.push(key.clone());
                    entries.insert(
                        key,
                        RrfEntry {
                            original_score: result.score,
                            evidence: result.signals.evidence,
                            fused: contribution,
                            representative: result,
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<SearchResult> = order
        .into_iter()
        .filter_map(|key| entries.remove(&key))
        .map(|entry| {
            let mut r = entry.representative;
            r.score = entry.fused;
            r.signals.evidence = entry.evidence;
            r
        })
        .collect();
    sort_by_score_desc(&mut fused);
    renumber(&mut fused);
    fused
}

/// Min-max scale to `[0, 1]`.
///
/// When every score is equal the range is taken as 1.0, so the whole list
/// maps to 0.0: a list with nothing to tell apart earns no weight.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let (min, max) = scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let span = if max - min > f64::EPSILON { max - min } else { 1.0 };
    scores.iter().map(|&s| (s - min) / span).collect()
}

#[derive(Default)]
struct Merged {
    result: Option<SearchResult>,
    dense_norm: Option<f64>,
    lexical_norm: Option<f64>,
    dense_raw: Option<f64>,
    lexical_raw: Option<f64>,
}

#[derive(Clone, Copy)]
enum Side {
    Dense,
    Lexical,
}

fn merge_side(
    order: &mut Vec<String>,
    merged: &mut HashMap<String, Merged>,
    results: Vec<SearchResult>,
    side: Side,
) {
    let norms = min_max_normalize(&results.iter().map(|r| r.score).collect::<Vec<_>>());
    for (result, norm) in results.into_iter().zip(norms) {
        let key = result.identity_key();
        let slot = merged.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Merged::default()
        });
        let (best, raw) = match side {
            Side::Dense => (&mut slot.dense_norm, &mut slot.dense_raw),
            Side::Lexical => (&mut slot.lexical_norm, &mut slot.lexical_raw),
        };
        if best.map_or(true, |prev| norm > prev) {
            *best = Some(norm);
            *raw = Some(result.score);
        }
        if slot.result.is_none() {
            slot.result = Some(result);
        }
    }
}

/// Weighted-linear fusion of a dense and a lexical list for the same source.
///
/// If either list is empty the other is returned untouched. Otherwise both
/// are min-max normalised independently, weighted, and summed per identity
/// key; the sum becomes `score` and the result's evidence.
pub fn weighted_fusion(
    dense: Vec<SearchResult>,
    lexical: Vec<SearchResult>,
    weights: FusionWeights,
) -> Vec<SearchResult> {
    if lexical.is_empty() {
        return dense;
    }
    if dense.is_empty() {
        return lexical;
    }

    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Merged> = HashMap::new();
    merge_side(&mut order, &mut merged, dense, Side::Dense);
    merge_side(&mut order, &mut merged, lexical, Side::Lexical);

    let mut fused: Vec<SearchResult> = order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .filter_map(|m| {
            let mut r = m.result?;
            let score = weights.dense * m.dense_norm.unwrap_or(0.0)
                + weights.lexical * m.lexical_norm.unwrap_or(0.0);
            if m.dense_norm.is_some() && m.lexical_norm.is_some() {
                r.metadata.method = RetrievalMethod::Hybrid;
            }
            r.score = score;
            r.signals.dense = m.dense_raw;
            r.signals.lexical = m.lexical_raw;
            r.signals.hybrid = Some(score);
            r.signals.evidence = score;
            Some(r)
        })
        .collect();
    sort_by_score_desc(&mut fused);
    renumber(&mut fused);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_spans_unit_interval() {
        assert_eq!(min_max_normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn normalize_degenerate_list_is_all_zeros() {
        assert_eq!(min_max_normalize(&[0.4, 0.4]), vec![0.0, 0.0]);
        assert_eq!(min_max_normalize(&[0.12]), vec![0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }
}

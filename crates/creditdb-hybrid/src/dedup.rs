//! Near-duplicate removal and per-credit grouping of the candidate pool.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use creditdb_core::traits::Embedder;
use creditdb_core::types::{renumber, sort_by_score_desc, SearchResult, Section};
use creditdb_vector::cosine_similarity;

use crate::diagnostics::{Degradation, DiagnosticSink, Stage};
use crate::options::GroupingOptions;

const ENTITY_BONUS_PER_MEMBER: f64 = 0.01;
const ENTITY_BONUS_CAP: usize = 5;

type EntityGroup = (String, Vec<SearchResult>);

fn embed_texts(
    results: &[SearchResult],
    embedder: &dyn Embedder,
    sink: &dyn DiagnosticSink,
) -> Option<Vec<Vec<f32>>> {
    let texts: Vec<String> = results.iter().map(|r| r.text.clone()).collect();
    let cause = match embedder.embed_batch(&texts) {
        Ok(v) if v.len() == texts.len() => return Some(v),
        Ok(v) => format!("embedder returned {} vectors for {} texts", v.len(), texts.len()),
        Err(err) => format!("{err:#}"),
    };
    sink.report(Stage::Deduplication, &Degradation::EmbeddingUnavailable { cause });
    None
}

/// Drop duplicates, keeping the higher-scored record of each pair.
///
/// Results with the same identity key or the same document page range always
/// collapse. Results sharing credit and section collapse when their text
/// embeddings reach `threshold` cosine similarity; without embeddings that
/// check degrades to the credit and section key alone.
pub fn remove_near_duplicates(
    mut results: Vec<SearchResult>,
    threshold: f32,
    embedder: Option<&dyn Embedder>,
    sink: &dyn DiagnosticSink,
) -> Vec<SearchResult> {
    if results.len() < 2 {
        return results;
    }
    sort_by_score_desc(&mut results);
    let embeddings = embedder.and_then(|e| embed_texts(&results, e, sink));

    let mut seen_identity: HashSet<String> = HashSet::new();
    let mut seen_pages: HashSet<String> = HashSet::new();
    // credit::section → positions (into `results`) of kept members.
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    let mut keep = vec![false; results.len()];

    for (i, r) in results.iter().enumerate() {
        if !seen_identity.insert(r.identity_key()) {
            continue;
        }
        if let Some(page) = r.page_key() {
            if !seen_pages.insert(page) {
                continue;
            }
        }
        if let Some(cs) = r.credit_section_key() {
            let members = buckets.entry(cs).or_default();
            let duplicate = match embeddings.as_deref() {
                Some(embs) => members
                    .iter()
                    .any(|&j| cosine_similarity(&embs[i], &embs[j]) >= threshold),
                None => !members.is_empty(),
            };
            if duplicate {
                continue;
            }
            members.push(i);
        }
        keep[i] = true;
    }

    let before = results.len();
    let kept: Vec<SearchResult> = results
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect();
    debug!(before, after = kept.len(), "removed near-duplicates");
    kept
}

/// Partition by owning credit, preserving first-appearance order.
pub fn group_by_entity(results: Vec<SearchResult>) -> Vec<EntityGroup> {
    let mut groups: Vec<EntityGroup> = Vec::new();
    let mut slot: HashMap<String, usize> = HashMap::new();
    for r in results {
        let key = r.entity_key().to_string();
        match slot.get(&key) {
            Some(&i) => groups[i].1.push(r),
            None => {
                slot.insert(key.clone(), groups.len());
                groups.push((key, vec![r]));
            }
        }
    }
    groups
}

/// Best member score plus a small bonus for breadth of evidence.
pub fn entity_relevance(members: &[SearchResult]) -> f64 {
    let best = members
        .iter()
        .map(|r| r.score)
        .fold(f64::NEG_INFINITY, f64::max);
    best + ENTITY_BONUS_PER_MEMBER * members.len().min(ENTITY_BONUS_CAP) as f64
}

/// Order groups by relevance (stable) and keep the first `top_entities`.
pub fn rank_entities(mut groups: Vec<EntityGroup>, top_entities: usize) -> Vec<EntityGroup> {
    groups.sort_by(|a, b| entity_relevance(&b.1).total_cmp(&entity_relevance(&a.1)));
    groups.truncate(top_entities);
    groups
}

/// Pick up to `max` members of one credit.
///
/// The best member of every section is taken first, highest section priority
/// first; leftover slots go to the remaining members by score.
pub fn select_per_entity(mut members: Vec<SearchResult>, max: usize) -> Vec<SearchResult> {
    if max == 0 {
        return Vec::new();
    }
    sort_by_score_desc(&mut members);

    let mut sections: Vec<Section> = Vec::new();
    for r in &members {
        if !sections.contains(&r.section()) {
            sections.push(r.section());
        }
    }
    sections.sort_by(|a, b| b.priority().cmp(&a.priority()));

    let mut taken = vec![false; members.len()];
    for section in sections.into_iter().take(max) {
        if let Some(i) = members.iter().position(|r| r.section() == section) {
            taken[i] = true;
        }
    }
    let mut room = max.saturating_sub(taken.iter().filter(|t| **t).count());
    for t in &mut taken {
        if room == 0 {
            break;
        }
        if !*t {
            *t = true;
            room -= 1;
        }
    }

    members
        .into_iter()
        .zip(taken)
        .filter_map(|(r, t)| t.then_some(r))
        .collect()
}

/// Full deduplicate → group → rank → select pass, renumbered by score.
pub fn dedupe_and_group(
    results: Vec<SearchResult>,
    opts: &GroupingOptions,
    embedder: Option<&dyn Embedder>,
    sink: &dyn DiagnosticSink,
) -> Vec<SearchResult> {
    if results.is_empty() {
        return results;
    }
    let deduped = remove_near_duplicates(results, opts.similarity_threshold, embedder, sink);
    let groups = rank_entities(group_by_entity(deduped), opts.top_entities);

    let mut selected: Vec<SearchResult> = groups
        .into_iter()
        .flat_map(|(_, members)| select_per_entity(members, opts.max_chunks_per_entity))
        .collect();
    sort_by_score_desc(&mut selected);
    renumber(&mut selected);
    selected
}

mod common;

use creditdb_core::traits::{DenseIndex, LexicalIndex};
use creditdb_core::types::{IndexHit, RetrievalMethod, Section};
use creditdb_hybrid::retriever::fetch_size;
use creditdb_hybrid::{
    aggregate, retrieve, Degradation, FusionMethod, Modality, RecordingSink, SearchOptions,
    SourceIndex, Stage,
};

use common::{chunk, ids};

struct FixedDense(Vec<IndexHit>);

impl DenseIndex for FixedDense {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn search(&self, _query_vec: &[f32], k: usize) -> anyhow::Result<Vec<IndexHit>> {
        Ok(self.0.iter().copied().take(k).collect())
    }
}

struct FixedLexical(Vec<IndexHit>);

impl LexicalIndex for FixedLexical {
    fn search(&self, _query: &str, k: usize) -> anyhow::Result<Vec<IndexHit>> {
        Ok(self.0.iter().copied().take(k).collect())
    }
}

struct BrokenLexical;

impl LexicalIndex for BrokenLexical {
    fn search(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<IndexHit>> {
        anyhow::bail!("segment missing")
    }
}

const Q: &[f32] = &[1.0];

fn hit(id: i64, score: f32) -> IndexHit {
    IndexHit { id, score }
}

fn source() -> SourceIndex {
    SourceIndex::new(
        "credits",
        vec![
            chunk("a", "WE-c1", Section::Requirements, "alpha"),
            chunk("b", "WE-c2", Section::Requirements, "bravo"),
            chunk("c", "WE-c3", Section::Requirements, "charlie"),
        ],
    )
}

#[test]
fn dense_only_source_filters_invalid_ids_and_tags_provenance() {
    let hits = vec![hit(1, 0.9), hit(-1, 0.8), hit(7, 0.7), hit(0, 0.5)];
    let src = source().with_dense(Box::new(FixedDense(hits)));
    let sink = RecordingSink::new();

    let out = retrieve(&src, "water", Some(Q), 5, &SearchOptions::default(), &sink);

    assert_eq!(ids(&out), vec!["b", "a"]);
    assert!(out
        .iter()
        .all(|r| r.metadata.index == "credits" && r.metadata.method == RetrievalMethod::Dense));
    assert_eq!(out[0].metadata.query, "water");
    assert_eq!(out[0].metadata.chunk.source, "credits");
    assert_eq!(out[1].rank, 2);
    assert!(sink.events().is_empty());
}

#[test]
fn lexical_zero_scores_are_dropped() {
    let src = source()
        .with_dense(Box::new(FixedDense(Vec::new())))
        .with_lexical(Box::new(FixedLexical(vec![hit(2, 4.0), hit(0, 0.0)])));
    let opts = SearchOptions::default();
    let out = retrieve(&src, "charlie", Some(Q), 5, &opts, &RecordingSink::new());
    assert_eq!(ids(&out), vec!["c"]);
    assert_eq!(out[0].metadata.method, RetrievalMethod::Lexical);
    assert_eq!(out[0].score, 4.0, "a single available side is returned unchanged");
}

#[test]
fn both_sides_fuse_and_truncate_to_k() {
    let src = source()
        .with_dense(Box::new(FixedDense(vec![hit(0, 0.9), hit(1, 0.6), hit(2, 0.3)])))
        .with_lexical(Box::new(FixedLexical(vec![hit(1, 8.0), hit(2, 1.0)])));
    let sink = RecordingSink::new();

    let weighted = retrieve(&src, "q", Some(Q), 2, &SearchOptions::default(), &sink);
    assert_eq!(weighted.len(), 2);
    assert_eq!(ids(&weighted), vec!["a", "b"]);
    assert_eq!(weighted[1].metadata.method, RetrievalMethod::Hybrid);
    assert_eq!(weighted[1].signals.hybrid, Some(weighted[1].score));

    let opts = SearchOptions {
        fusion_method: FusionMethod::Rrf,
        ..Default::default()
    };
    let fused = retrieve(&src, "q", Some(Q), 3, &opts, &sink);
    // b: 1/62 + 1/61, c: 1/63 + 1/62, a: 1/61
    assert_eq!(ids(&fused), vec!["b", "c", "a"]);
    assert_eq!(fused[0].metadata.method, RetrievalMethod::Hybrid);
    assert_eq!(
        fused[0].signals.evidence,
        f64::from(0.6f32),
        "evidence keeps the dense similarity"
    );
    assert_eq!(fused[2].metadata.method, RetrievalMethod::Dense);
}

#[test]
fn broken_lexical_index_degrades_to_dense() {
    let src = source()
        .with_dense(Box::new(FixedDense(vec![hit(2, 0.7)])))
        .with_lexical(Box::new(BrokenLexical));
    let sink = RecordingSink::new();

    let out = retrieve(&src, "q", Some(Q), 3, &SearchOptions::default(), &sink);

    assert_eq!(ids(&out), vec!["c"]);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Stage::Retrieval);
    assert!(matches!(
        &events[0].1,
        Degradation::DegradedHybrid { name, lost: Modality::Lexical, .. } if name == "credits"
    ));
}

#[test]
fn missing_query_vector_falls_back_to_lexical_even_without_hybrid() {
    let src = source()
        .with_dense(Box::new(FixedDense(vec![hit(0, 0.9)])))
        .with_lexical(Box::new(FixedLexical(vec![hit(1, 2.5)])));
    let opts = SearchOptions {
        use_hybrid: false,
        ..Default::default()
    };
    let sink = RecordingSink::new();

    assert_eq!(ids(&retrieve(&src, "q", None, 3, &opts, &sink)), vec!["b"]);
    assert_eq!(ids(&retrieve(&src, "q", Some(Q), 3, &opts, &sink)), vec!["a"]);
}

#[test]
fn fetch_size_is_clamped() {
    let opts = SearchOptions {
        max_candidates: 50,
        ..Default::default()
    };
    assert_eq!(fetch_size(5, &opts), 15);
    assert_eq!(fetch_size(40, &opts), 50);
}

#[test]
fn aggregate_merges_sources_by_score() {
    let a = source().with_dense(Box::new(FixedDense(vec![hit(0, 0.4)])));
    let b = SourceIndex::new("guide", vec![chunk("g", "WE-c1", Section::Calc, "guide text")])
        .with_dense(Box::new(FixedDense(vec![hit(0, 0.8)])));
    let sink = RecordingSink::new();
    let opts = SearchOptions::default();

    let out = aggregate(vec![
        retrieve(&a, "q", Some(Q), 3, &opts, &sink),
        retrieve(&b, "q", Some(Q), 3, &opts, &sink),
    ]);

    assert_eq!(ids(&out), vec!["g", "a"]);
    assert_eq!(out[0].metadata.index, "guide");
    assert_eq!(out[1].rank, 2);
}

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use creditdb_core::config::Config;
use creditdb_core::traits::Embedder;
use creditdb_core::types::RetrievalMethod;
use creditdb_core::Error;
use creditdb_embed::FakeEmbedder;
use creditdb_hybrid::{
    expand, initialize, Catalog, FusionMethod, RecordingSink, SearchOptions, Stage,
};

use common::{credits_corpus, guide_corpus, LeedShyEmbedder};

fn catalog_with(embedder: Arc<dyn Embedder>, sink: Arc<RecordingSink>) -> Catalog {
    let mut builder = Catalog::builder(embedder).sink(sink).default_source("credits");
    builder.add_chunks("credits", credits_corpus(), true).expect("credits source");
    builder.add_chunks("guide", guide_corpus(), true).expect("guide source");
    builder.build().expect("catalog")
}

fn catalog(sink: Arc<RecordingSink>) -> Catalog {
    catalog_with(Arc::new(FakeEmbedder::new(256)), sink)
}

fn both_sources() -> SearchOptions {
    SearchOptions::default().with_sources(["credits", "guide"])
}

#[test]
fn water_efficiency_scenario() {
    let query = "water efficiency requirements";
    let subqueries = expand(query, 6);
    assert!(subqueries[0].starts_with(query));
    assert!(subqueries.iter().any(|q| q.contains("WE water use reduction")));

    let sink = Arc::new(RecordingSink::new());
    let results = catalog(sink.clone()).search(query, 5, &both_sources());

    assert!(!results.is_empty());
    assert!(results.len() <= 5);
    for r in &results {
        assert!(
            r.credit_id().is_some_and(|c| c.starts_with("WE")),
            "unexpected credit {:?}",
            r.credit_id()
        );
    }
    let unique: HashSet<_> = results.iter().map(|r| r.chunk_id()).collect();
    assert_eq!(unique.len(), results.len(), "no chunk appears twice");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=results.len()).collect::<Vec<_>>());
    assert!(
        sink.events().is_empty(),
        "healthy catalog reports nothing: {:?}",
        sink.events()
    );
}

#[test]
fn search_is_deterministic_across_calls_and_threads() {
    let catalog = catalog(Arc::new(RecordingSink::new()));
    let opts = both_sources();
    let render = || {
        let results = catalog.search("outdoor water thresholds", 4, &opts);
        serde_json::to_string(&results).expect("json")
    };
    let baseline = render();
    assert_eq!(render(), baseline);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(render)).collect();
        for h in handles {
            assert_eq!(h.join().expect("thread"), baseline);
        }
    });
}

#[test]
fn unknown_source_is_reported_and_default_is_used() {
    let sink = Arc::new(RecordingSink::new());
    let opts = SearchOptions::default().with_sources(["forms"]);
    let results = catalog(sink.clone()).search("water metering", 3, &opts);

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.metadata.index == "credits"));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Stage::SourceSelection);
    assert_eq!(events[0].1.kind(), "missing_source");
}

#[test]
fn query_embedding_failure_falls_back_to_lexical() {
    let sink = Arc::new(RecordingSink::new());
    let embedder = Arc::new(LeedShyEmbedder(Arc::new(FakeEmbedder::new(128))));
    let catalog = catalog_with(embedder, sink.clone());
    let results = catalog.search("water efficiency requirements", 5, &both_sources());

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.metadata.method == RetrievalMethod::Lexical));
    assert!(sink
        .events()
        .iter()
        .any(|(stage, e)| *stage == Stage::QueryEmbedding && e.kind() == "embedding_unavailable"));
}

#[test]
fn plain_dense_search_without_expansion() {
    let opts = SearchOptions {
        use_hybrid: false,
        use_query_expansion: false,
        ..both_sources()
    };
    let results = catalog(Arc::new(RecordingSink::new())).search("indoor water use", 3, &opts);

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.metadata.method == RetrievalMethod::Dense));
    assert!(results.iter().all(|r| r.metadata.query == "indoor water use"));
}

#[test]
fn rrf_fusion_and_ungrouped_output_respect_k() {
    let opts = SearchOptions {
        fusion_method: FusionMethod::Rrf,
        use_grouping: false,
        ..both_sources()
    };
    let results = catalog(Arc::new(RecordingSink::new())).search("water use reduction", 4, &opts);
    assert!(!results.is_empty() && results.len() <= 4);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn chunk_loaded_in_two_sources_survives_once_with_best_score() {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(256));
    let mut builder = Catalog::builder(embedder).sink(Arc::new(RecordingSink::new()));
    let mut everything = credits_corpus();
    everything.extend(guide_corpus());
    builder.add_chunks("all", everything, true).expect("all source");
    builder.add_chunks("credits", credits_corpus(), true).expect("credits source");
    let catalog = builder.build().expect("catalog");

    let single_query = SearchOptions {
        use_query_expansion: false,
        use_grouping: false,
        ..SearchOptions::default()
    };
    let query = "outdoor water use reduction";
    let opts = single_query.clone().with_sources(["all", "credits"]);
    let combined = catalog.search(query, 20, &opts);

    assert!(!combined.is_empty());
    let unique: HashSet<_> = combined.iter().map(|r| r.chunk_id()).collect();
    assert_eq!(unique.len(), combined.len(), "same chunk id from two sources collapses");

    for source in ["all", "credits"] {
        let opts = single_query.clone().with_sources([source]);
        for single in catalog.search(query, 20, &opts) {
            let Some(kept) = combined.iter().find(|r| r.chunk_id() == single.chunk_id()) else {
                continue;
            };
            assert!(
                kept.score >= single.score,
                "{:?} kept a lower-scored copy",
                kept.chunk_id()
            );
        }
    }
}

#[test]
fn degenerate_requests_return_nothing() {
    let catalog = catalog(Arc::new(RecordingSink::new()));
    assert!(catalog.search("water", 0, &SearchOptions::default()).is_empty());
    assert!(catalog.search("   ", 5, &SearchOptions::default()).is_empty());
}

#[test]
fn empty_catalog_refuses_to_build() {
    let builder = Catalog::builder(Arc::new(FakeEmbedder::new(8)));
    assert!(matches!(builder.build(), Err(Error::NoSources)));
}

#[test]
fn listings_describe_loaded_sources_and_credits() {
    let catalog = catalog(Arc::new(RecordingSink::new()));

    let sources = catalog.sources();
    let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["credits", "guide"]);
    assert_eq!(sources[0].chunks, 9);
    assert!(sources.iter().all(|s| s.dense && s.lexical));

    let credits = catalog.credits();
    let codes: Vec<_> = credits.iter().filter_map(|c| c.credit_code.as_deref()).collect();
    assert_eq!(codes, vec!["EA", "MR", "WE"]);
    assert_eq!(credits[2].chunks, 7);
}

#[test]
fn initialize_from_config_skips_unloadable_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = serde_json::to_string(&credits_corpus()).expect("json");
    std::fs::write(dir.path().join("credits.json"), corpus).expect("write corpus");
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
[engine]
default_source = "credits"

[engine.embedding]
fake = true
dim = 64

[engine.search]
fusion_method = "rrf"
top_entities = 2

[[engine.sources]]
name = "credits"
path = "credits.json"

[[engine.sources]]
name = "ghost"
path = "missing/ghost.json"
"#,
    )
    .expect("write config");

    let config = Config::load_from(dir.path()).expect("config");
    let engine = config.engine().expect("engine config");
    let defaults: SearchOptions = config.get_or_default("engine.search").expect("search options");
    assert_eq!(defaults.fusion_method, FusionMethod::Rrf);
    assert_eq!(defaults.top_entities, 2);
    assert_eq!(defaults.max_chunks_per_entity, 3);

    let catalog = initialize(&engine).expect("catalog").with_search_defaults(defaults);
    assert_eq!(catalog.sources().len(), 1);
    assert_eq!(catalog.default_source(), "credits");

    let results = catalog.search_default("outdoor water use reduction", 5);
    let credits: HashSet<_> = results.iter().filter_map(|r| r.credit_id()).collect();
    assert!(!results.is_empty());
    assert!(credits.len() <= 2);
}

#[test]
fn initialize_without_any_loadable_source_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
[engine.embedding]
fake = true
dim = 16

[[engine.sources]]
name = "all"
path = "nowhere"
"#,
    )
    .expect("write config");

    let engine = Config::load_from(dir.path())
        .expect("config")
        .engine()
        .expect("engine");
    assert!(matches!(initialize(&engine), Err(Error::NoSources)));
}

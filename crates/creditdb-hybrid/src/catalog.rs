//! The loaded engine: every source's indices plus the shared embedder,
//! built once and read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use creditdb_core::config::EngineConfig;
use creditdb_core::corpus::CorpusLoader;
use creditdb_core::traits::Embedder;
use creditdb_core::types::{Chunk, SearchResult};
use creditdb_core::{Error, Result};
use creditdb_text::Bm25Index;
use creditdb_vector::build_flat_index;

use crate::assemble::{apply_floor, finalize};
use crate::dedup::{dedupe_and_group, remove_near_duplicates};
use crate::diagnostics::{Degradation, DiagnosticSink, Modality, Stage, TracingSink};
use crate::expand::expand;
use crate::fusion::rrf;
use crate::options::SearchOptions;
use crate::retriever::{aggregate, retrieve, SourceIndex};

/// Status line for one loaded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub chunks: usize,
    pub dense: bool,
    pub lexical: bool,
}

/// One distinct credit found in the default source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<String>,
    pub chunks: usize,
}

pub struct CatalogBuilder {
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DiagnosticSink>,
    default_source: String,
    defaults: SearchOptions,
    batch_size: usize,
    sources: Vec<SourceIndex>,
}

impl CatalogBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            sink: Arc::new(TracingSink),
            default_source: "all".to_string(),
            defaults: SearchOptions::default(),
            batch_size: 32,
            sources: Vec::new(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn default_source(mut self, name: impl Into<String>) -> Self {
        self.default_source = name.into();
        self
    }

    pub fn search_defaults(mut self, defaults: SearchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed `chunks` into a dense index and, when `lexical` is set, build a
    /// BM25 index next to it. A BM25 failure leaves the source dense-only.
    pub fn add_chunks(
        &mut self,
        name: &str,
        chunks: Vec<Chunk>,
        lexical: bool,
    ) -> anyhow::Result<()> {
        if self.sources.iter().any(|s| s.name == name) {
            anyhow::bail!("source '{name}' already loaded");
        }
        let dense = build_flat_index(self.embedder.as_ref(), &chunks, self.batch_size)
            .with_context(|| format!("embedding source '{name}'"))?;
        let mut source = SourceIndex::new(name, chunks).with_dense(Box::new(dense));
        if lexical {
            match Bm25Index::build(&source.chunks) {
                Ok(bm25) => source = source.with_lexical(Box::new(bm25)),
                Err(e) => self.sink.report(
                    Stage::Catalog,
                    &Degradation::DegradedHybrid {
                        name: name.to_string(),
                        lost: Modality::Lexical,
                        cause: format!("{e:#}"),
                    },
                ),
            }
        }
        info!(
            source = name,
            chunks = source.len(),
            lexical = source.lexical.is_some(),
            "📚 source loaded"
        );
        self.sources.push(source);
        Ok(())
    }

    /// Register prebuilt indices.
    pub fn add_index(&mut self, source: SourceIndex) {
        self.sources.push(source);
    }

    pub fn build(self) -> Result<Catalog> {
        if !self.sources.iter().any(|s| s.dense.is_some()) {
            return Err(Error::NoSources);
        }
        Ok(Catalog {
            sources: self.sources,
            default_source: self.default_source,
            embedder: self.embedder,
            sink: self.sink,
            defaults: self.defaults,
        })
    }
}

/// Load every configured source with the configured embedder.
///
/// Sources that fail to load are skipped with a warning; the only fatal
/// outcome is ending up with none.
pub fn initialize(engine: &EngineConfig) -> Result<Catalog> {
    let embedder = creditdb_embed::load_embedder(&engine.embedding)
        .map_err(|e| Error::Operation(format!("loading embedder: {e:#}")))?;
    initialize_with(engine, Arc::from(embedder), Arc::new(TracingSink))
}

pub fn initialize_with(
    engine: &EngineConfig,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<Catalog> {
    let loader = CorpusLoader::new();
    let mut builder = CatalogBuilder::new(embedder)
        .sink(sink)
        .default_source(engine.default_source.clone())
        .batch_size(engine.embedding.batch_size);

    for source in &engine.sources {
        let chunks = match loader.load(&source.path) {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => {
                warn!(
                    source = %source.name,
                    path = %source.path.display(),
                    "⚠️  source has no chunks, skipping"
                );
                continue;
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "⚠️  failed to load source, skipping");
                continue;
            }
        };
        if let Err(e) = builder.add_chunks(&source.name, chunks, source.lexical) {
            warn!(source = %source.name, error = ?e, "⚠️  failed to index source, skipping");
        }
    }
    builder.build()
}

pub struct Catalog {
    sources: Vec<SourceIndex>,
    default_source: String,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn DiagnosticSink>,
    defaults: SearchOptions,
}

impl Catalog {
    pub fn builder(embedder: Arc<dyn Embedder>) -> CatalogBuilder {
        CatalogBuilder::new(embedder)
    }

    /// Replace the options used by [`Catalog::search_default`].
    pub fn with_search_defaults(mut self, defaults: SearchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn search_defaults(&self) -> &SearchOptions {
        &self.defaults
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn search_default(&self, query: &str, k: usize) -> Vec<SearchResult> {
        self.search(query, k, &self.defaults)
    }

    /// Answer `query` with at most `k` results.
    ///
    /// Never fails: every fallback taken along the way is reported to the
    /// diagnostic sink instead.
    #[instrument(skip(self, opts), fields(sources = ?opts.sources))]
    pub fn search(&self, query: &str, k: usize, opts: &SearchOptions) -> Vec<SearchResult> {
        let query = query.trim();
        if k == 0 || query.is_empty() {
            return Vec::new();
        }
        let sink = self.sink.as_ref();

        let sources = self.resolve_sources(opts.sources.as_deref());
        let pool = k.saturating_mul(opts.candidate_multiplier.max(1));

        let subqueries = if opts.use_query_expansion {
            expand(query, opts.max_subqueries)
        } else {
            vec![query.to_string()]
        };
        debug!(?subqueries, "expanded query");

        let vectors = if sources.iter().any(|s| s.dense.is_some()) {
            self.embed_queries(&subqueries)
        } else {
            None
        };

        let per_query: Vec<Vec<SearchResult>> = subqueries
            .iter()
            .enumerate()
            .map(|(i, subquery)| {
                let vec = vectors.as_ref().and_then(|v| v.get(i)).map(Vec::as_slice);
                aggregate(
                    sources
                        .iter()
                        .map(|s| retrieve(s, subquery, vec, pool, opts, sink))
                        .collect(),
                )
            })
            .collect();

        let fused = rrf(per_query, opts.rrf_k);
        let floored = apply_floor(fused, opts.min_score, k.saturating_mul(2), sink);
        let embedder = Some(self.embedder.as_ref());
        let selected = if opts.use_grouping {
            dedupe_and_group(floored, &opts.grouping(), embedder, sink)
        } else {
            remove_near_duplicates(floored, opts.similarity_threshold, embedder, sink)
        };
        let results = finalize(selected, k);
        info!(results = results.len(), "🔍 search complete");
        results
    }

    fn embed_queries(&self, subqueries: &[String]) -> Option<Vec<Vec<f32>>> {
        let cause = match self.embedder.embed_batch(subqueries) {
            Ok(v) if v.len() == subqueries.len() => return Some(v),
            Ok(v) => format!(
                "embedder returned {} vectors for {} queries",
                v.len(),
                subqueries.len()
            ),
            Err(e) => format!("{e:#}"),
        };
        self.sink.report(
            Stage::QueryEmbedding,
            &Degradation::EmbeddingUnavailable { cause },
        );
        None
    }

    /// Requested sources that have a dense index; otherwise the default
    /// source, otherwise the first searchable one.
    fn resolve_sources(&self, requested: Option<&[String]>) -> Vec<&SourceIndex> {
        let searchable = |name: &str| {
            self.sources
                .iter()
                .find(|s| s.name == name && s.dense.is_some())
        };

        let mut picked: Vec<&SourceIndex> = Vec::new();
        for name in requested.unwrap_or_default() {
            match searchable(name.as_str()) {
                Some(s) if !picked.iter().any(|p| p.name == s.name) => picked.push(s),
                Some(_) => {}
                None => self.sink.report(
                    Stage::SourceSelection,
                    &Degradation::MissingSource { name: name.clone() },
                ),
            }
        }
        if picked.is_empty() {
            let fallback = searchable(self.default_source.as_str())
                .or_else(|| self.sources.iter().find(|s| s.dense.is_some()));
            if let Some(s) = fallback {
                picked.push(s);
            }
        }
        picked
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.sources
            .iter()
            .map(|s| SourceSummary {
                name: s.name.clone(),
                chunks: s.len(),
                dense: s.dense.is_some(),
                lexical: s.lexical.is_some(),
            })
            .collect()
    }

    /// Distinct credits in the default source, ordered by code then name.
    pub fn credits(&self) -> Vec<CreditSummary> {
        let Some(source) = self.resolve_sources(None).into_iter().next() else {
            return Vec::new();
        };
        let mut credits: BTreeMap<(String, String), CreditSummary> = BTreeMap::new();
        for chunk in &source.chunks {
            let meta = &chunk.metadata;
            if meta.credit_code.is_none() && meta.credit_name.is_none() {
                continue;
            }
            let key = (
                meta.credit_code.clone().unwrap_or_default(),
                meta.credit_name.clone().unwrap_or_default(),
            );
            credits
                .entry(key)
                .or_insert_with(|| CreditSummary {
                    credit_id: meta.credit_id.clone(),
                    credit_code: meta.credit_code.clone(),
                    credit_name: meta.credit_name.clone(),
                    chunks: 0,
                })
                .chunks += 1;
        }
        credits.into_values().collect()
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use creditdb_core::traits::Embedder;
use creditdb_core::types::{Chunk, ChunkMetadata, RetrievalMethod, SearchResult, Section};

pub fn chunk(chunk_id: &str, credit: &str, section: Section, text: &str) -> Chunk {
    let code = credit.split('-').next().unwrap_or_default().to_string();
    Chunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            credit_id: Some(credit.to_string()),
            section,
            chunk_id: Some(chunk_id.to_string()),
            credit_code: Some(code),
            ..Default::default()
        },
    }
}

pub fn result(chunk_id: &str, credit: &str, section: Section, score: f64) -> SearchResult {
    let c = chunk(chunk_id, credit, section, &format!("text of {chunk_id}"));
    SearchResult::from_chunk(&c, "credits", "q", RetrievalMethod::Dense, 1, score)
}

pub fn ids(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.chunk_id().unwrap_or("?")).collect()
}

/// Returns a fixed vector per known text; unknown texts fail.
pub struct TableEmbedder {
    pub dim: usize,
    pub table: HashMap<String, Vec<f32>>,
}

impl Embedder for TableEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        512
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.table
                    .get(t)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no vector for '{t}'"))
            })
            .collect()
    }
}

/// Delegates to an inner embedder but refuses any text mentioning LEED, so
/// corpus indexing succeeds while expanded queries cannot be embedded.
pub struct LeedShyEmbedder(pub Arc<dyn Embedder>);

impl Embedder for LeedShyEmbedder {
    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn max_len(&self) -> usize {
        self.0.max_len()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("LEED")) {
            anyhow::bail!("encoder offline");
        }
        self.0.embed_batch(texts)
    }
}

/// Credit chunks: four water credits, one energy and one materials credit.
pub fn credits_corpus() -> Vec<Chunk> {
    vec![
        chunk(
            "we-p1-req",
            "WE-p1",
            Section::Requirements,
            "Indoor water use reduction prerequisite: reduce water use 20 percent from the baseline for fixtures and fittings.",
        ),
        chunk("we-p1-int", "WE-p1", Section::Intent, "Intent: reduce indoor water consumption."),
        chunk(
            "we-c1-req",
            "WE-c1",
            Section::Requirements,
            "Outdoor water use reduction: reduce landscape water requirement by 30 percent from the calculated baseline for the site peak watering month.",
        ),
        chunk(
            "we-c1-thr",
            "WE-c1",
            Section::Thresholds,
            "Outdoor water use reduction thresholds: 30 percent earns 1 point, 50 percent earns 2 points.",
        ),
        chunk(
            "we-c2-req",
            "WE-c2",
            Section::Requirements,
            "Indoor water use reduction credit: further reduce fixture and fitting water use from the calculated baseline.",
        ),
        chunk(
            "we-c2-doc",
            "WE-c2",
            Section::Documentation,
            "Submit the indoor water use calculator with fixture flow and flush rates.",
        ),
        chunk(
            "we-p2-req",
            "WE-p2",
            Section::Requirements,
            "Building level water metering: install permanent water meters that measure total potable water use.",
        ),
        chunk(
            "ea-p2-int",
            "EA-p2",
            Section::Intent,
            "Minimum energy performance: demonstrate improvement over the ASHRAE 90.1 baseline.",
        ),
        chunk(
            "mr-c1-int",
            "MR-c1",
            Section::Intent,
            "Building product disclosure and optimization for construction materials.",
        ),
    ]
}

/// Reference guide chunks for the same credits, under their own ids.
pub fn guide_corpus() -> Vec<Chunk> {
    vec![
        chunk(
            "guide-we-c1",
            "WE-c1",
            Section::Calc,
            "Guide: calculate the landscape water requirement using plant factor and irrigation efficiency.",
        ),
        chunk(
            "guide-we-p1",
            "WE-p1",
            Section::Definitions,
            "Guide: fixtures and fittings covered by the water use reduction prerequisite.",
        ),
        chunk(
            "guide-ea-p2",
            "EA-p2",
            Section::Calc,
            "Guide: energy performance baseline modeling under ASHRAE Appendix G.",
        ),
    ]
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How dense and lexical lists for one source are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// Min-max normalised scores blended with `dense_weight`/`lexical_weight`.
    #[default]
    Weighted,
    /// Reciprocal rank fusion with `rrf_k`.
    Rrf,
}

impl FromStr for FusionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(FusionMethod::Weighted),
            "rrf" => Ok(FusionMethod::Rrf),
            other => Err(format!(
                "unknown fusion method '{other}' (expected 'weighted' or 'rrf')"
            )),
        }
    }
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FusionMethod::Weighted => "weighted",
            FusionMethod::Rrf => "rrf",
        })
    }
}

/// Per-request knobs for [`crate::Catalog::search`].
///
/// Every tuning constant lives here so it can be set from the `[engine.search]`
/// configuration table instead of being baked into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Sources to query; `None` means the catalog's default source.
    pub sources: Option<Vec<String>>,
    pub use_hybrid: bool,
    pub fusion_method: FusionMethod,
    pub dense_weight: f64,
    pub lexical_weight: f64,
    pub rrf_k: u32,
    pub use_query_expansion: bool,
    pub max_subqueries: usize,
    pub use_grouping: bool,
    pub top_entities: usize,
    pub max_chunks_per_entity: usize,
    pub similarity_threshold: f32,
    /// Confidence floor on the per-source retrieval scale.
    pub min_score: f64,
    /// Internal candidate pool is `k * candidate_multiplier`.
    pub candidate_multiplier: usize,
    /// Upper bound on hits requested from any single index.
    pub max_candidates: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            sources: None,
            use_hybrid: true,
            fusion_method: FusionMethod::Weighted,
            dense_weight: 0.7,
            lexical_weight: 0.3,
            rrf_k: 60,
            use_query_expansion: true,
            max_subqueries: 6,
            use_grouping: true,
            top_entities: 3,
            max_chunks_per_entity: 3,
            similarity_threshold: 0.97,
            min_score: 0.3,
            candidate_multiplier: 3,
            max_candidates: 200,
        }
    }
}

impl SearchOptions {
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn grouping(&self) -> GroupingOptions {
        GroupingOptions {
            top_entities: self.top_entities,
            max_chunks_per_entity: self.max_chunks_per_entity,
            similarity_threshold: self.similarity_threshold,
        }
    }

    pub fn weights(&self) -> FusionWeights {
        FusionWeights {
            dense: self.dense_weight,
            lexical: self.lexical_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub dense: f64,
    pub lexical: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            dense: 0.7,
            lexical: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingOptions {
    pub top_entities: usize,
    pub max_chunks_per_entity: usize,
    pub similarity_threshold: f32,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            top_entities: 3,
            max_chunks_per_entity: 3,
            similarity_threshold: 0.97,
        }
    }
}

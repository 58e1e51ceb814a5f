//! creditdb-hybrid
//!
//! Retrieval engine over the credit knowledge base: query expansion,
//! per-source dense + BM25 retrieval, rank fusion, a confidence floor,
//! deduplication and per-credit grouping, behind an immutable [`Catalog`].

pub mod assemble;
pub mod catalog;
pub mod dedup;
pub mod diagnostics;
pub mod expand;
pub mod fusion;
pub mod options;
pub mod retriever;

pub use catalog::{
    initialize, initialize_with, Catalog, CatalogBuilder, CreditSummary, SourceSummary,
};
pub use dedup::dedupe_and_group;
pub use diagnostics::{Degradation, DiagnosticSink, Modality, RecordingSink, Stage, TracingSink};
pub use expand::expand;
pub use fusion::{rrf, weighted_fusion};
pub use options::{FusionMethod, FusionWeights, GroupingOptions, SearchOptions};
pub use retriever::{aggregate, retrieve, SourceIndex};

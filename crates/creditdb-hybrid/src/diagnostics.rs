//! Degradation reporting.
//!
//! Retrieval never fails a request; instead every stage that falls back to a
//! weaker behaviour reports a [`Degradation`] to the catalog's
//! [`DiagnosticSink`].

use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

/// Pipeline stage that observed a degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SourceSelection,
    QueryEmbedding,
    Retrieval,
    Filtering,
    Deduplication,
    Catalog,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::SourceSelection => "source_selection",
            Stage::QueryEmbedding => "query_embedding",
            Stage::Retrieval => "retrieval",
            Stage::Filtering => "filtering",
            Stage::Deduplication => "deduplication",
            Stage::Catalog => "catalog",
        })
    }
}

/// Retrieval modality of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Dense,
    Lexical,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modality::Dense => "dense",
            Modality::Lexical => "lexical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Degradation {
    #[error("source '{name}' is not loaded and was skipped")]
    MissingSource { name: String },

    #[error("source '{name}' lost its {lost} side: {cause}")]
    DegradedHybrid {
        name: String,
        lost: Modality,
        cause: String,
    },

    #[error("embeddings unavailable: {cause}")]
    EmbeddingUnavailable { cause: String },

    #[error("score floor {floor} removed all {candidates} candidates; kept top {kept} unfiltered")]
    EmptyAfterFiltering {
        floor: f64,
        candidates: usize,
        kept: usize,
    },
}

impl Degradation {
    pub fn kind(&self) -> &'static str {
        match self {
            Degradation::MissingSource { .. } => "missing_source",
            Degradation::DegradedHybrid { .. } => "degraded_hybrid",
            Degradation::EmbeddingUnavailable { .. } => "embedding_unavailable",
            Degradation::EmptyAfterFiltering { .. } => "empty_after_filtering",
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, stage: Stage, event: &Degradation);
}

/// Default sink: one structured `tracing` warning per degradation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, stage: Stage, event: &Degradation) {
        warn!(stage = %stage, kind = event.kind(), "{event}");
    }
}

/// Keeps every reported degradation; used by tests and by callers that want
/// to attach diagnostics to a response.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Stage, Degradation)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Stage, Degradation)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(|(_, e)| e.kind()).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, stage: Stage, event: &Degradation) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stage, event.clone()));
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for std::sync::Arc<T> {
    fn report(&self, stage: Stage, event: &Degradation) {
        (**self).report(stage, event)
    }
}

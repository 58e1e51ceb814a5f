//! Domain types shared by every retrieval stage.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, serde_json::Value>;

/// Logical part of a credit a chunk was cut from.
///
/// Unrecognised or missing labels collapse to `Unknown`, so the corpus never
/// fails to load over a new section name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Section {
    Intent,
    Requirements,
    Documentation,
    Calc,
    Thresholds,
    Definitions,
    #[default]
    Unknown,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Intent => "intent",
            Section::Requirements => "requirements",
            Section::Documentation => "documentation",
            Section::Calc => "calc",
            Section::Thresholds => "thresholds",
            Section::Definitions => "definitions",
            Section::Unknown => "unknown",
        }
    }

    /// Selection priority inside an entity group; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Section::Requirements => 10,
            Section::Intent => 9,
            Section::Documentation => 8,
            Section::Calc => 7,
            Section::Thresholds => 6,
            Section::Definitions => 5,
            Section::Unknown => 1,
        }
    }

    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "intent" => Section::Intent,
            "requirements" => Section::Requirements,
            "documentation" => Section::Documentation,
            "calc" => Section::Calc,
            "thresholds" => Section::Thresholds,
            "definitions" => Section::Definitions,
            _ => Section::Unknown,
        }
    }
}

impl FromStr for Section {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Section {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Section::parse_lenient).unwrap_or_default())
    }
}

/// Metadata attached to a chunk when the corpus was built offline.
///
/// Keys this engine does not interpret are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_id: Option<String>,
    #[serde(default)]
    pub section: Section,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<ChunkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<String>,
    #[serde(flatten)]
    pub extra: Meta,
}

/// An immutable unit of retrievable text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Raw hit returned by a dense or lexical index: a score and a corpus ordinal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub score: f32,
    pub id: i64,
}

/// Indicates which retrieval path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Dense,
    Lexical,
    Hybrid,
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RetrievalMethod::Dense => "dense",
            RetrievalMethod::Lexical => "lexical",
            RetrievalMethod::Hybrid => "hybrid",
        })
    }
}

/// Per-signal scores carried alongside the stage score.
///
/// `evidence` stays on the per-source retrieval scale (dense similarity,
/// weighted hybrid score or raw BM25) even after rank fusion rewrites
/// `score`; the confidence floor is applied to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<f64>,
    #[serde(default)]
    pub evidence: f64,
}

/// Chunk metadata plus provenance of the retrieval path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(flatten)]
    pub chunk: ChunkMetadata,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_query")]
    pub query: String,
    #[serde(rename = "_retrieval_method")]
    pub method: RetrievalMethod,
}

/// One ranked record produced by a retrieval or fusion stage.
///
/// `rank` is 1-based and reassigned by every stage; `score` is stage
/// specific but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub score: f64,
    pub text: String,
    pub metadata: ResultMetadata,
    #[serde(default)]
    pub signals: ScoreSignals,
}

const HASH_PREFIX_CHARS: usize = 200;

impl SearchResult {
    pub fn from_chunk(
        chunk: &Chunk,
        source: &str,
        query: &str,
        method: RetrievalMethod,
        rank: usize,
        score: f64,
    ) -> Self {
        let mut meta = chunk.metadata.clone();
        if meta.source.is_empty() {
            meta.source = source.to_string();
        }
        let signals = ScoreSignals {
            dense: (method == RetrievalMethod::Dense).then_some(score),
            lexical: (method == RetrievalMethod::Lexical).then_some(score),
            hybrid: None,
            evidence: score,
        };
        Self {
            rank,
            score,
            text: chunk.text.clone(),
            metadata: ResultMetadata {
                chunk: meta,
                index: source.to_string(),
                query: query.to_string(),
                method,
            },
            signals,
        }
    }

    pub fn credit_id(&self) -> Option<&str> {
        self.metadata.chunk.credit_id.as_deref()
    }

    pub fn chunk_id(&self) -> Option<&str> {
        self.metadata.chunk.chunk_id.as_deref()
    }

    pub fn section(&self) -> Section {
        self.metadata.chunk.section
    }

    /// Grouping key: the owning credit, or `"unknown"`.
    pub fn entity_key(&self) -> &str {
        self.credit_id().unwrap_or("unknown")
    }

    /// Deterministic identity used to merge the same chunk across fusion stages.
    ///
    /// Order: chunk id, then credit + section + page range, then a hash of the
    /// first 200 characters of text, then rank + score.
    pub fn identity_key(&self) -> String {
        let meta = &self.metadata.chunk;
        if let Some(id) = meta.chunk_id.as_deref().filter(|id| !id.is_empty()) {
            return format!("chunk_id:{id}");
        }
        let credit = meta.credit_id.as_deref().filter(|c| !c.is_empty());
        if let (Some(credit), Some(start)) = (credit, meta.page_start) {
            let end = meta.page_end.map(|p| p.to_string()).unwrap_or_default();
            return format!("credit:{credit}::section:{}::pages:{start}-{end}", meta.section);
        }
        if !self.text.is_empty() {
            let prefix: String = self.text.chars().take(HASH_PREFIX_CHARS).collect();
            let digest = blake3::hash(prefix.as_bytes()).to_hex();
            return format!("text_hash:{}", &digest.as_str()[..16]);
        }
        format!("rank:{}::score:{}", self.rank, self.score)
    }

    /// Same document and page range; such results are always duplicates.
    pub fn page_key(&self) -> Option<String> {
        let meta = &self.metadata.chunk;
        match (meta.doc.as_deref(), meta.page_start, meta.page_end) {
            (Some(doc), Some(start), Some(end)) if !doc.is_empty() => {
                Some(format!("{doc}::{start}-{end}"))
            }
            _ => None,
        }
    }

    /// Same credit and section; duplicates only when the texts are near-identical.
    pub fn credit_section_key(&self) -> Option<String> {
        self.credit_id()
            .filter(|c| !c.is_empty())
            .map(|c| format!("{c}::{}", self.section()))
    }
}

/// Stable sort, highest score first. Ties keep their incoming order.
pub fn sort_by_score_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Reassign 1-based ranks in list order.
pub fn renumber(results: &mut [SearchResult]) {
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }
}

use crate::types::IndexHit;

/// Text → vector. Implementations must be deterministic for identical input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbour search over one source's chunk vectors.
///
/// Scores use inner-product semantics. An id outside `[0, corpus_size)`
/// (typically `-1`) means "no match" and must be discarded by the caller.
pub trait DenseIndex: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn search(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<IndexHit>>;
}

/// Keyword search over one source's tokenized chunk texts. Scores are BM25.
pub trait LexicalIndex: Send + Sync {
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<IndexHit>>;
}

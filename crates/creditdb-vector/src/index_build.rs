use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use creditdb_core::traits::Embedder;
use creditdb_core::types::Chunk;

use crate::flat::FlatIndex;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}";

/// Embed every chunk text, `batch_size` texts per encoder call.
pub fn embed_corpus(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let pb = ProgressBar::new(chunks.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embs = embedder.embed_batch(&texts)?;
        if embs.len() != texts.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                embs.len(),
                texts.len()
            );
        }
        vectors.extend(embs);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(vectors)
}

/// Embed `chunks` and load the vectors into a fresh [`FlatIndex`].
pub fn build_flat_index(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<FlatIndex> {
    let vectors = embed_corpus(embedder, chunks, batch_size)?;
    let index = FlatIndex::from_vectors(embedder.dim(), &vectors)?;
    info!(chunks = chunks.len(), dim = embedder.dim(), "built dense index");
    Ok(index)
}

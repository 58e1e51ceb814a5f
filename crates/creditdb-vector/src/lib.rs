//! creditdb-vector
//!
//! Exact inner-product dense index over one source's chunk embeddings, plus
//! the batched corpus embedding pass that fills it at startup.

pub mod flat;
pub mod index_build;

pub use flat::{cosine_similarity, FlatIndex};
pub use index_build::{build_flat_index, embed_corpus};

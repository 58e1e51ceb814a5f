//! creditdb-text
//!
//! Tantivy-based BM25 lexical index over one source's chunks, built in RAM at
//! startup and read-only afterwards.

pub mod index;
pub mod search;
pub mod tantivy_utils;

pub use index::Bm25Index;
pub use tantivy_utils::{tokenize, CreditTokenizer};

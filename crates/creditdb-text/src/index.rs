use anyhow::Result;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::info;

use creditdb_core::types::{Chunk, Section};

use crate::tantivy_utils::{build_schema, register_tokenizer, ORDINAL_FIELD, TEXT_FIELD};

/// BM25 index over one source. Document ordinals are positions in the chunk
/// slice the index was built from.
pub struct Bm25Index {
    pub(crate) reader: IndexReader,
    pub(crate) ordinal_field: tantivy::schema::Field,
    pub(crate) text_field: tantivy::schema::Field,
    len: usize,
}

impl Bm25Index {
    pub fn build(chunks: &[Chunk]) -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index);
        let ordinal_field = schema.get_field(ORDINAL_FIELD)?;
        let text_field = schema.get_field(TEXT_FIELD)?;
        // Single indexing thread keeps segment layout, and therefore tie order, stable.
        let mut index_writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
        for (ordinal, chunk) in chunks.iter().enumerate() {
            index_writer.add_document(doc!(
                ordinal_field => ordinal as u64,
                text_field => enhanced_text(chunk),
            ))?;
        }
        index_writer.commit()?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        info!(chunks = chunks.len(), "built BM25 index");
        Ok(Self {
            reader,
            ordinal_field,
            text_field,
            len: chunks.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Chunk text prefixed with its credit id, section, credit name and code so
/// keyword queries such as "WE prerequisite" hit the right credit.
pub fn enhanced_text(chunk: &Chunk) -> String {
    let meta = &chunk.metadata;
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    if let Some(id) = meta.credit_id.as_deref() {
        parts.push(id);
    }
    if meta.section != Section::Unknown {
        parts.push(meta.section.as_str());
    }
    if let Some(name) = meta.credit_name.as_deref() {
        parts.push(name);
    }
    if let Some(code) = meta.credit_code.as_deref() {
        parts.push(code);
    }
    parts.push(&chunk.text);
    parts.join(" ")
}

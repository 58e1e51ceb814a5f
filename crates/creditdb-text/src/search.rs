use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use tracing::debug;

use creditdb_core::traits::LexicalIndex;
use creditdb_core::types::IndexHit;

use crate::index::Bm25Index;
use crate::tantivy_utils::tokenize;

impl Bm25Index {
    /// One optional BM25 clause per query token; repeated tokens weigh more.
    fn build_query(&self, query: &str) -> Option<BooleanQuery> {
        let clauses: Vec<(Occur, Box<dyn Query>)> = tokenize(query)
            .into_iter()
            .map(|token| {
                let term = Term::from_field_text(self.text_field, &token);
                let query = TermQuery::new(term, IndexRecordOption::WithFreqs);
                (Occur::Should, Box::new(query) as Box<dyn Query>)
            })
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(BooleanQuery::new(clauses))
        }
    }
}

impl LexicalIndex for Bm25Index {
    fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let Some(q) = self.build_query(query) else {
            debug!(query, "no indexable tokens in BM25 query");
            return Ok(vec![]);
        };
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(addr)?;
            let ordinal = doc.get_first(self.ordinal_field).and_then(|v| v.as_u64());
            let Some(ordinal) = ordinal else {
                continue;
            };
            hits.push(IndexHit {
                score,
                id: ordinal as i64,
            });
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(hits)
    }
}

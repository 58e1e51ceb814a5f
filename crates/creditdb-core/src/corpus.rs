//! Loading pre-chunked corpora produced by the offline extraction pipeline.
//!
//! A source is either a single `.json` file holding an array of
//! `{ "text": ..., "metadata": {...} }` records, a `.jsonl` file with one
//! record per line, or a directory containing any number of those.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Chunk;

#[derive(Default)]
pub struct CorpusLoader;

impl CorpusLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, path: &Path) -> Result<Vec<Chunk>> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let files = if path.is_dir() {
            self.list_chunk_files(path)
        } else {
            vec![path.to_path_buf()]
        };
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(
                file = %file_path.display(),
                "loading chunk file {}/{}",
                file_index + 1,
                files.len()
            );
            let content = self.read_file_content(file_path)?;
            let mut chunks = self.parse(file_path, &content)?;
            chunks.retain(|c| !c.text.trim().is_empty());
            all_chunks.extend(chunks);
        }
        info!(
            path = %path.display(),
            files = files.len(),
            chunks = all_chunks.len(),
            "loaded corpus"
        );
        Ok(all_chunks)
    }

    fn parse(&self, file_path: &Path, content: &str) -> Result<Vec<Chunk>> {
        let corpus_err = |message: String| Error::Corpus {
            path: file_path.display().to_string(),
            message,
        };
        if file_path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            let mut chunks = Vec::new();
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let chunk: Chunk = serde_json::from_str(line)
                    .map_err(|e| corpus_err(format!("line {}: {e}", line_no + 1)))?;
                chunks.push(chunk);
            }
            return Ok(chunks);
        }
        serde_json::from_str(content).map_err(|e| corpus_err(e.to_string()))
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        let bytes = fs::read(file_path).map_err(|e| Error::Corpus {
            path: file_path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn list_chunk_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if matches!(ext, Some("json" | "jsonl")) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }
}

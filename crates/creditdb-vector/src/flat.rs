use anyhow::{bail, Result};

use creditdb_core::traits::DenseIndex;
use creditdb_core::types::IndexHit;

/// Brute-force inner-product index. Vectors are stored row-major in one
/// buffer; ids are row positions.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim);
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            bail!("vector has {} dims, index expects {}", vector.len(), self.dim);
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

impl DenseIndex for FlatIndex {
    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if query_vec.len() != self.dim {
            bail!("query has {} dims, index expects {}", query_vec.len(), self.dim);
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut scored: Vec<IndexHit> = (0..self.len())
            .map(|i| IndexHit {
                score: dot(query_vec, self.row(i)),
                id: i as i64,
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; zero when either vector has zero norm or the widths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot_product = dot(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

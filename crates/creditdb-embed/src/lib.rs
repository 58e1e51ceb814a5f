//! creditdb-embed
//!
//! Embedding providers for the retrieval engine: a local XLM-RoBERTa model
//! (BGE-M3 weights) run with candle, and a hashed `FakeEmbedder` for tests
//! and development that needs no model files.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use creditdb_core::config::EmbeddingConfig;
use creditdb_core::traits::Embedder;

pub use pool::masked_mean_l2;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "🔄 Loading embedding model from local files...");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!(
                "Failed to load tokenizer from {}: {}",
                tokenizer_path.display(),
                e
            )
        })?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!(dim, max_len, "✅ Embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
            max_len,
        })
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_batch_on_device(
            &self.tokenizer,
            texts,
            self.max_len,
            &self.device,
        )?;
        let token_type_ids = Tensor::zeros((texts.len(), self.max_len), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(
            &input_ids,
            &attention_mask,
            &token_type_ids,
            None,
            None,
            None,
        )?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if rows.iter().any(|r| r.len() != self.dim) {
            bail!("embedding width differs from model hidden size {}", self.dim);
        }
        if start.elapsed().as_millis() > 100 * texts.len() as u128 {
            warn!(batch = texts.len(), "⚠️  Slow embedding");
        }
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.forward_batch(texts)
    }
}

/// Deterministic bag-of-hashed-tokens embedder.
///
/// Identical texts map to identical L2-normalised vectors, and texts sharing
/// tokens have positive cosine similarity, which is all the retrieval tests
/// need.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Pick the embedder described by `config`, honouring `APP_USE_FAKE_EMBEDDINGS`.
pub fn load_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if config.fake || fake_requested_by_env() {
        info!(dim = config.dim, "🧪 Using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(config.dim)));
    }
    let model_dir = resolve_model_dir(config.model_dir.as_deref())?;
    Ok(Box::new(EmbeddingModel::load(&model_dir, config.max_len)?))
}

fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() {
            debug!("📦 Using configured model dir: {}", p.display());
            return Ok(p.to_path_buf());
        }
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                debug!("📦 Using {var}: {}", p.display());
                return Ok(p);
            }
        }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            debug!("📦 Using model dir: {}", p.display());
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!(
        "Could not locate embedding model directory (set engine.embedding.model_dir or APP_MODEL_DIR)"
    ))
}

//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&env::current_dir()?)
    }

    /// Load `config.toml` (and the env-specific overlay) from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        let overlay = match env_name.as_str() {
            "dev" | "development" => Some("config.dev.toml"),
            "prod" | "production" => Some("config.prod.toml"),
            "test" | "testing" => Some("config.test.toml"),
            _ => None,
        };
        if let Some(file) = overlay {
            figment = figment.merge(Toml::file(dir.join(file)));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self {
            figment,
            base_dir: dir.to_path_buf(),
        };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like [`Config::get`] but a missing key yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn engine(&self) -> Result<EngineConfig> {
        let mut engine: EngineConfig = self
            .get_or_default("engine")
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        for source in &mut engine.sources {
            source.path = resolve_with_base(&self.base_dir, source.path.to_string_lossy());
        }
        if let Some(dir) = engine.embedding.model_dir.take() {
            let dir = resolve_with_base(&self.base_dir, dir.to_string_lossy());
            engine.embedding.model_dir = Some(dir);
        }
        engine.validate()?;
        Ok(engine)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "dev" | "development" => {}
            "prod" | "production" => {
                let engine: EngineConfig = self.get_or_default("engine")?;
                if engine.embedding.fake {
                    return Err(anyhow::anyhow!("Prod config must not use fake embeddings"));
                }
            }
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// Typed view of the `[engine]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Source searched when a request names none (or only unknown ones).
    pub default_source: String,
    pub sources: Vec<SourceConfig>,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_source: "all".to_string(),
            sources: Vec::new(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                return Err(Error::InvalidConfig("source name must not be empty".to_string()));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate source '{}'", s.name)));
            }
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be > 0".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// One named corpus partition: a JSON chunk file or a directory of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    /// Build a BM25 index for this source.
    #[serde(default = "default_true")]
    pub lexical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Use the hashed fake embedder instead of loading model weights.
    pub fake: bool,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            fake: false,
            dim: 1024,
            max_len: 256,
            batch_size: 32,
            model_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Corpus error in {path}: {message}")]
    Corpus { path: String, message: String },

    #[error("No source could be loaded; refusing to serve queries")]
    NoSources,
}

pub type Result<T> = std::result::Result<T, Error>;

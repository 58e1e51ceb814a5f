//! creditdb-core
//!
//! Shared domain types, collaborator traits, configuration and corpus loading
//! for the credit retrieval engine.

#![forbid(unsafe_code)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};

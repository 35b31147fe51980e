//! Error taxonomy surfaced by engine operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed caller input, rejected before any cache is touched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested property does not exist in the catalog.
    #[error("not found: {0}")]
    NotFound(String),

    /// The catalog collaborator failed. Never retried here.
    #[error("catalog query failed: {0:#}")]
    Catalog(anyhow::Error),
}

impl EngineError {
    pub fn catalog(err: anyhow::Error) -> Self {
        EngineError::Catalog(err)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(_) => "not_found",
            EngineError::Catalog(_) => "catalog",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

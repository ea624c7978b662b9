//! Error types for the similarity engine.
//!
//! Fatal run errors live in [`EngineError`]; per-document persistence
//! failures are [`WriteError`]s, which the engine reports and skips.

use crate::DocId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A token map broke the upstream contract (non-positive count).
    #[error("document {doc_id}: token {token:?} has non-positive count {count}")]
    NonPositiveCount { doc_id: DocId, token: String, count: i64 },

    /// The same identifier was supplied twice.
    #[error("document {doc_id} appears more than once in the corpus")]
    DuplicateDocument { doc_id: DocId },

    /// The corpus could not be read in full.
    #[error("failed to load corpus: {0:#}")]
    CorpusLoad(#[source] anyhow::Error),

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl EngineError {
    pub fn corpus_load(err: impl Into<anyhow::Error>) -> Self {
        Self::CorpusLoad(err.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// True for errors caused by a malformed upstream token map.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::NonPositiveCount { .. } | Self::DuplicateDocument { .. })
    }
}

/// A failed write through a [`crate::sink::ResultSink`].
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("write rejected: {0}")]
    Rejected(String),
}

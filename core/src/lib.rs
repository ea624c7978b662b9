//! Document similarity graph and centrality ranking.
//!
//! A [`Corpus`] of token-frequency maps goes through the
//! [`SimilarityEngine`], which writes each document's neighbor list and
//! centrality rank to a [`ResultSink`].

pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod rank;
pub mod sink;
pub mod source;
pub mod tokens;

pub use config::{
    EngineConfig, PairStrategy, DEFAULT_EPSILON, DEFAULT_MATRIX_BUDGET_BYTES, DEFAULT_THRESHOLD,
};
pub use distance::distance;
pub use engine::{CancelToken, DocumentResult, RunSummary, SimilarityEngine};
pub use error::{EngineError, WriteError};
pub use index::{Corpus, DocId, Document, RawDocument};
pub use persist::{NeighborRecord, RunMeta, Store};
pub use rank::{centrality_rank, top_ranked};
pub use sink::{MemorySink, ResultSink};
pub use source::{CorpusSource, JsonlSource};
pub use tokens::{RawTokenMap, TokenFrequencyMap};

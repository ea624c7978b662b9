//! Pairwise similarity pass over a frozen corpus.
//!
//! For every document the engine walks all other documents in corpus order,
//! collects those strictly closer than the threshold and sums every distance
//! on top of the epsilon floor. The outer loop runs on a rayon pool; the
//! corpus is shared read-only and results go straight to a [`ResultSink`].

use crate::config::{EngineConfig, PairStrategy};
use crate::distance::distance;
use crate::error::{EngineError, Result, WriteError};
use crate::index::Corpus;
use crate::rank::centrality_rank;
use crate::sink::ResultSink;
use crate::DocId;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// Output for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResult {
    pub doc_id: DocId,
    /// Neighbor ids in corpus order.
    pub neighbors: Vec<DocId>,
    /// Epsilon plus the sum of distances to every other document.
    pub distance_accum: f64,
    pub rank: f64,
}

/// Run-wide abort flag, cheap to clone into signal handlers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub num_docs: usize,
    /// Documents whose neighbors and rank were both written.
    pub processed: usize,
    /// Documents dropped because the sink refused a write.
    pub skipped: usize,
    pub skipped_docs: Vec<DocId>,
    pub cancelled: bool,
    /// Strategy actually used; `Exhaustive` when the matrix was over budget.
    pub strategy: PairStrategy,
    pub elapsed_s: f64,
}

/// Packed upper triangle of the distance matrix, without the diagonal.
pub struct DistanceMatrix {
    n: usize,
    cells: Vec<f64>,
}

/// Outcome of [`DistanceMatrix::build`].
pub enum MatrixBuild {
    Built(DistanceMatrix),
    /// Over the byte budget, or the allocation was refused. `None` when the
    /// size does not even fit in `usize`.
    TooLarge { required_bytes: Option<usize> },
    Cancelled,
}

impl DistanceMatrix {
    /// Bytes needed to cache every unordered pair of `n` documents.
    pub fn required_bytes(n: usize) -> Option<usize> {
        let pairs = n.checked_mul(n.saturating_sub(1))? / 2;
        pairs.checked_mul(std::mem::size_of::<f64>())
    }

    /// Compute each unordered pair once into a single preallocated buffer.
    pub fn build(corpus: &Corpus, cancel: &CancelToken, budget_bytes: usize) -> MatrixBuild {
        let docs = corpus.documents();
        let n = docs.len();
        let required = Self::required_bytes(n);
        let len = match required {
            Some(bytes) if bytes <= budget_bytes => bytes / std::mem::size_of::<f64>(),
            _ => return MatrixBuild::TooLarge { required_bytes: required },
        };
        let mut cells: Vec<f64> = Vec::new();
        if cells.try_reserve_exact(len).is_err() {
            return MatrixBuild::TooLarge { required_bytes: required };
        }
        cells.resize(len, 0.0);

        // split the buffer into one slice per row, row i holding pairs (i, i+1..n)
        let mut rows: Vec<(usize, &mut [f64])> = Vec::with_capacity(n);
        let mut rest: &mut [f64] = &mut cells;
        for i in 0..n {
            let (row, tail) = std::mem::take(&mut rest).split_at_mut(n - 1 - i);
            rows.push((i, row));
            rest = tail;
        }
        rows.into_par_iter().for_each(|(i, row)| {
            if cancel.is_cancelled() {
                return;
            }
            let tokens = &docs[i].tokens;
            for (cell, other) in row.iter_mut().zip(&docs[i + 1..]) {
                *cell = distance(tokens, &other.tokens);
            }
        });

        if cancel.is_cancelled() {
            return MatrixBuild::Cancelled;
        }
        MatrixBuild::Built(Self { n, cells })
    }

    /// Distance between corpus positions `i` and `j` (`i != j`).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i != j && i < self.n && j < self.n);
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        // rows before `lo` hold (n-1) + (n-2) + ... + (n-lo) cells
        let row_start = lo * (2 * self.n - lo - 1) / 2;
        self.cells[row_start + (hi - lo - 1)]
    }

    pub fn len(&self) -> usize { self.n }

    pub fn is_empty(&self) -> bool { self.n == 0 }
}

enum Distances<'a> {
    Cached(DistanceMatrix),
    Direct(&'a Corpus),
}

impl Distances<'_> {
    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            Distances::Cached(m) => m.get(i, j),
            Distances::Direct(corpus) => {
                let docs = corpus.documents();
                distance(&docs[i].tokens, &docs[j].tokens)
            }
        }
    }

    fn strategy(&self) -> PairStrategy {
        match self {
            Distances::Cached(_) => PairStrategy::Symmetric,
            Distances::Direct(_) => PairStrategy::Exhaustive,
        }
    }
}

pub struct SimilarityEngine {
    config: EngineConfig,
}

impl SimilarityEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Results for every document, in corpus order, without writing anywhere.
    pub fn compute(&self, corpus: &Corpus) -> Result<Vec<DocumentResult>> {
        let pool = self.pool()?;
        let cancel = CancelToken::new();
        Ok(pool.install(|| {
            let distances = match self.distances(corpus, &cancel) {
                Some(d) => d,
                None => return Vec::new(),
            };
            (0..corpus.len())
                .into_par_iter()
                .map(|i| self.document_result(corpus, &distances, i))
                .collect()
        }))
    }

    /// Compute every document and hand its results to `sink`.
    ///
    /// A failed write is logged and counted; the run carries on. Setting
    /// `cancel` stops further documents from being started, leaving the
    /// ones already written in place.
    pub fn run<S: ResultSink + ?Sized>(
        &self,
        corpus: &Corpus,
        sink: &S,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let num_docs = corpus.len();
        tracing::info!(
            num_docs,
            threshold = self.config.threshold,
            epsilon = self.config.epsilon,
            strategy = ?self.config.strategy,
            "starting similarity run"
        );

        let pool = self.pool()?;
        let processed = AtomicUsize::new(0);
        let skipped_docs: Mutex<Vec<DocId>> = Mutex::new(Vec::new());

        let strategy = pool.install(|| {
            let distances = match self.distances(corpus, cancel) {
                Some(d) => d,
                None => return self.config.strategy,
            };
            (0..num_docs).into_par_iter().for_each(|i| {
                if cancel.is_cancelled() {
                    return;
                }
                let result = self.document_result(corpus, &distances, i);
                match emit(sink, &result) {
                    Ok(()) => {
                        processed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            doc_id = result.doc_id,
                            neighbors = result.neighbors.len(),
                            distance_accum = result.distance_accum,
                            rank = result.rank,
                            "processed document"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            doc_id = result.doc_id,
                            error = %err,
                            "failed to store results, skipping document"
                        );
                        skipped_docs.lock().push(result.doc_id);
                    }
                }
            });
            distances.strategy()
        });

        let mut skipped_docs = skipped_docs.into_inner();
        skipped_docs.sort_unstable_by_key(|id| corpus.position(*id));
        let cancelled = cancel.is_cancelled();
        if cancelled {
            tracing::warn!("similarity run cancelled");
        }
        let summary = RunSummary {
            num_docs,
            processed: processed.into_inner(),
            skipped: skipped_docs.len(),
            skipped_docs,
            cancelled,
            strategy,
            elapsed_s: start.elapsed().as_secs_f64(),
        };
        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            cancelled,
            elapsed_s = summary.elapsed_s,
            "similarity run finished"
        );
        Ok(summary)
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("simgraph-{i}"))
            .build()
            .map_err(|e| EngineError::invalid_config(format!("cannot start worker pool: {e}")))
    }

    fn distances<'a>(&self, corpus: &'a Corpus, cancel: &CancelToken) -> Option<Distances<'a>> {
        if self.config.strategy == PairStrategy::Exhaustive {
            return Some(Distances::Direct(corpus));
        }
        match DistanceMatrix::build(corpus, cancel, self.config.matrix_budget_bytes) {
            MatrixBuild::Built(matrix) => Some(Distances::Cached(matrix)),
            MatrixBuild::Cancelled => None,
            MatrixBuild::TooLarge { required_bytes } => {
                tracing::warn!(
                    num_docs = corpus.len(),
                    required_bytes = ?required_bytes,
                    budget_bytes = self.config.matrix_budget_bytes,
                    "distance matrix over budget, evaluating every pair directly"
                );
                Some(Distances::Direct(corpus))
            }
        }
    }

    fn document_result(
        &self,
        corpus: &Corpus,
        distances: &Distances<'_>,
        i: usize,
    ) -> DocumentResult {
        let n = corpus.len();
        let docs = corpus.documents();
        let mut neighbors = Vec::new();
        let mut distance_accum = self.config.epsilon;
        for j in 0..n {
            if j == i {
                continue;
            }
            let dist = distances.get(i, j);
            if dist < self.config.threshold {
                neighbors.push(docs[j].id);
            }
            distance_accum += dist;
        }
        DocumentResult {
            doc_id: docs[i].id,
            neighbors,
            distance_accum,
            rank: centrality_rank(distance_accum, n),
        }
    }
}

fn emit<S: ResultSink + ?Sized>(
    sink: &S,
    result: &DocumentResult,
) -> std::result::Result<(), WriteError> {
    let now = OffsetDateTime::now_utc();
    sink.store_neighbors(result.doc_id, &result.neighbors, now)?;
    sink.store_rank(result.doc_id, result.rank)
}

use simgraph_core::{
    CancelToken, Corpus, DocId, Document, DocumentResult, EngineConfig, EngineError, MemorySink,
    PairStrategy, RawDocument, ResultSink, SimilarityEngine, WriteError, DEFAULT_EPSILON,
};
use std::collections::HashMap;
use time::OffsetDateTime;

fn doc(id: DocId, pairs: &[(&str, u64)]) -> Document {
    Document::new(id, pairs.iter().map(|(t, c)| (*t, *c)).collect())
}

fn corpus(docs: Vec<Document>) -> Corpus {
    Corpus::from_documents(docs).unwrap()
}

fn engine() -> SimilarityEngine {
    SimilarityEngine::new(EngineConfig::default()).unwrap()
}

fn by_id(results: Vec<DocumentResult>) -> HashMap<DocId, DocumentResult> {
    results.into_iter().map(|r| (r.doc_id, r)).collect()
}

#[test]
fn identical_and_disjoint_documents() {
    let corpus = corpus(vec![doc(1, &[("x", 1)]), doc(2, &[("x", 1)]), doc(3, &[("y", 1)])]);
    let results = by_id(engine().compute(&corpus).unwrap());

    assert_eq!(results[&1].neighbors, vec![2]);
    assert_eq!(results[&2].neighbors, vec![1]);
    assert!(results[&3].neighbors.is_empty());

    // A: 0 to B, 1 to C
    assert!((results[&1].distance_accum - (DEFAULT_EPSILON + 1.0)).abs() < 1e-12);
    assert!((results[&3].distance_accum - (DEFAULT_EPSILON + 2.0)).abs() < 1e-12);
    assert!((results[&3].rank - 2.0 / (DEFAULT_EPSILON + 2.0)).abs() < 1e-12);
}

#[test]
fn weighted_counts_make_mutual_neighbors() {
    let corpus = corpus(vec![doc(1, &[("x", 2), ("y", 1)]), doc(2, &[("x", 1), ("y", 1)])]);
    let results = by_id(engine().compute(&corpus).unwrap());
    assert_eq!(results[&1].neighbors, vec![2]);
    assert_eq!(results[&2].neighbors, vec![1]);
    assert!((results[&1].distance_accum - (DEFAULT_EPSILON + 1.0 / 3.0)).abs() < 1e-12);
}

#[test]
fn threshold_is_strict() {
    // distance is exactly 0.5
    let corpus = Corpus::from_documents(vec![doc(1, &[("x", 2)]), doc(2, &[("x", 1)])]).unwrap();
    let at = SimilarityEngine::new(EngineConfig::default().with_threshold(0.5)).unwrap();
    assert!(at.compute(&corpus).unwrap().iter().all(|r| r.neighbors.is_empty()));
    let above = SimilarityEngine::new(EngineConfig::default().with_threshold(0.5000001)).unwrap();
    assert!(above.compute(&corpus).unwrap().iter().all(|r| r.neighbors.len() == 1));
}

#[test]
fn singleton_corpus() {
    let corpus = Corpus::from_documents(vec![doc(42, &[("whale", 3)])]).unwrap();
    let results = engine().compute(&corpus).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].distance_accum, DEFAULT_EPSILON);
    assert_eq!(results[0].rank, 0.0);
    assert!(results[0].neighbors.is_empty());
}

#[test]
fn neighbors_follow_corpus_order() {
    let corpus = Corpus::from_documents(vec![
        doc(10, &[("a", 1)]),
        doc(5, &[("a", 1), ("b", 1)]),
        doc(7, &[("a", 1)]),
        doc(1, &[("a", 1)]),
    ])
    .unwrap();
    let results = engine().compute(&corpus).unwrap();
    let ids: Vec<DocId> = results.iter().map(|r| r.doc_id).collect();
    assert_eq!(ids, vec![10, 5, 7, 1]);
    assert_eq!(results[0].neighbors, vec![5, 7, 1]);
    assert_eq!(results[2].neighbors, vec![10, 5, 1]);
    for r in &results {
        assert!(!r.neighbors.contains(&r.doc_id));
    }
}

#[test]
fn strategies_agree() {
    let corpus = Corpus::from_documents(vec![
        doc(1, &[("call", 1), ("me", 1), ("ishmael", 1)]),
        doc(2, &[("call", 2), ("me", 1)]),
        doc(3, &[("whale", 7), ("sea", 2)]),
        doc(4, &[]),
        doc(5, &[("sea", 2), ("ship", 1), ("call", 1)]),
    ])
    .unwrap();
    let with = |strategy| {
        SimilarityEngine::new(EngineConfig::default().with_strategy(strategy)).unwrap()
    };
    let symmetric = with(PairStrategy::Symmetric);
    let exhaustive = with(PairStrategy::Exhaustive);
    assert_eq!(symmetric.compute(&corpus).unwrap(), exhaustive.compute(&corpus).unwrap());
}

#[test]
fn over_budget_matrix_falls_back_to_exhaustive() {
    let corpus = corpus(vec![
        doc(1, &[("call", 1), ("me", 1)]),
        doc(2, &[("call", 2), ("me", 1)]),
        doc(3, &[("whale", 7)]),
        doc(4, &[("whale", 6), ("sea", 1)]),
    ]);
    let cached = engine();
    let starved = SimilarityEngine::new(EngineConfig::default().with_matrix_budget(0)).unwrap();
    assert_eq!(starved.compute(&corpus).unwrap(), cached.compute(&corpus).unwrap());

    let summary = cached.run(&corpus, &MemorySink::new(), &CancelToken::new()).unwrap();
    assert_eq!(summary.strategy, PairStrategy::Symmetric);

    let sink = MemorySink::new();
    let summary = starved.run(&corpus, &sink, &CancelToken::new()).unwrap();
    assert_eq!(summary.strategy, PairStrategy::Exhaustive);
    assert_eq!(summary.processed, 4);
    assert_eq!(sink.neighbors(1), Some(vec![2]));
    assert_eq!(sink.neighbors(3), Some(vec![4]));
}

#[test]
fn run_writes_every_document() {
    let corpus = corpus(vec![doc(1, &[("x", 1)]), doc(2, &[("x", 1)]), doc(3, &[("y", 1)])]);
    let sink = MemorySink::new();
    let summary = engine().run(&corpus, &sink, &CancelToken::new()).unwrap();
    assert_eq!(summary.num_docs, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.cancelled);
    assert_eq!(sink.neighbors(1), Some(vec![2]));
    assert_eq!(sink.neighbors(3), Some(vec![]));
    assert_eq!(sink.num_ranks(), 3);
}

/// Refuses rank writes for the listed documents.
struct FlakySink {
    inner: MemorySink,
    reject: Vec<DocId>,
}

impl ResultSink for FlakySink {
    fn store_neighbors(
        &self,
        doc_id: DocId,
        neighbors: &[DocId],
        timestamp: OffsetDateTime,
    ) -> Result<(), WriteError> {
        self.inner.store_neighbors(doc_id, neighbors, timestamp)
    }

    fn store_rank(&self, doc_id: DocId, rank: f64) -> Result<(), WriteError> {
        if self.reject.contains(&doc_id) {
            return Err(WriteError::Rejected(format!("no room for {doc_id}")));
        }
        self.inner.store_rank(doc_id, rank)
    }
}

#[test]
fn sink_failures_skip_only_the_failing_document() {
    let corpus = corpus((1..=6).map(|i| doc(i, &[("x", i as u64)])).collect());
    let sink = FlakySink { inner: MemorySink::new(), reject: vec![4, 2] };
    let summary = engine().run(&corpus, &sink, &CancelToken::new()).unwrap();
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.skipped_docs, vec![2, 4]);
    // neighbors landed before the rank write failed
    assert!(sink.inner.neighbors(4).is_some());
    assert!(sink.inner.rank(4).is_none());
    assert!(sink.inner.rank(5).is_some());
}

/// Cancels the run as soon as the first document is written.
struct CancellingSink {
    inner: MemorySink,
    cancel: CancelToken,
}

impl ResultSink for CancellingSink {
    fn store_neighbors(
        &self,
        doc_id: DocId,
        neighbors: &[DocId],
        timestamp: OffsetDateTime,
    ) -> Result<(), WriteError> {
        self.inner.store_neighbors(doc_id, neighbors, timestamp)
    }

    fn store_rank(&self, doc_id: DocId, rank: f64) -> Result<(), WriteError> {
        self.inner.store_rank(doc_id, rank)?;
        self.cancel.cancel();
        Ok(())
    }
}

#[test]
fn cancellation_keeps_written_results() {
    let corpus = corpus((1..=50).map(|i| doc(i, &[("x", i as u64)])).collect());
    let cancel = CancelToken::new();
    let sink = CancellingSink { inner: MemorySink::new(), cancel: cancel.clone() };
    let engine = SimilarityEngine::new(EngineConfig::default().with_threads(1)).unwrap();
    let summary = engine.run(&corpus, &sink, &cancel).unwrap();
    assert!(summary.cancelled);
    assert!(summary.processed >= 1);
    assert!(summary.processed < 50);
    assert_eq!(sink.inner.num_ranks(), summary.processed);
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let corpus = Corpus::from_documents(vec![doc(1, &[("x", 1)]), doc(2, &[("x", 1)])]).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let sink = MemorySink::new();
    let summary = engine().run(&corpus, &sink, &cancel).unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert_eq!(sink.num_neighbor_records(), 0);
}

#[test]
fn malformed_corpus_fails_before_any_work() {
    let raw = vec![
        RawDocument { id: 1, title: None, tokens: [("x".to_string(), 1)].into_iter().collect() },
        RawDocument { id: 2, title: None, tokens: [("x".to_string(), -3)].into_iter().collect() },
    ];
    let err = Corpus::load(&raw).unwrap_err();
    assert!(matches!(err, EngineError::NonPositiveCount { doc_id: 2, count: -3, .. }));
}

#[test]
fn reruns_are_identical() {
    let corpus = corpus(
        (0..40u32)
            .map(|i| {
                let (a, b, c) = ((i % 3 + 1) as u64, (i % 5 + 1) as u64, (i % 7) as u64);
                doc(i, &[("a", a), ("b", b), ("c", c)])
            })
            .collect(),
    );
    let e = engine();
    assert_eq!(e.compute(&corpus).unwrap(), e.compute(&corpus).unwrap());
}

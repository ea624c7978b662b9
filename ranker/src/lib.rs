use anyhow::{Context, Result};
use serde::Serialize;
use simgraph_core::persist::STORE_VERSION;
use simgraph_core::{
    CancelToken, Corpus, DocId, EngineConfig, JsonlSource, MemorySink, NeighborRecord, RunMeta,
    RunSummary, SimilarityEngine, Store,
};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// Validate token maps under `input` and write them into the store.
pub fn import(input: &Path, store_dir: &Path) -> Result<usize> {
    let store = Store::open(store_dir)?;
    let n = store.import(&JsonlSource::new(input))?;
    Ok(n)
}

/// Run the similarity pass over every document in the store.
///
/// With `dry_run` results are kept in memory and the store is left
/// untouched apart from reading the corpus.
pub fn run(
    store_dir: &Path,
    config: EngineConfig,
    dry_run: bool,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let engine = SimilarityEngine::new(config)?;
    let store = Store::open(store_dir)?;
    let corpus = Corpus::load(&store)?;

    let summary = if dry_run {
        engine.run(&corpus, &MemorySink::new(), cancel)?
    } else {
        let summary = engine.run(&corpus, &store, cancel)?;
        let meta = RunMeta {
            num_docs: summary.num_docs as u32,
            processed: summary.processed as u32,
            skipped: summary.skipped as u32,
            cancelled: summary.cancelled,
            threshold: engine.config().threshold,
            epsilon: engine.config().epsilon,
            finished_at: time::OffsetDateTime::now_utc().format(&Rfc3339)?,
            version: STORE_VERSION,
        };
        store.save_meta(&meta)?;
        store.flush()?;
        summary
    };
    Ok(summary)
}

#[derive(Debug, Serialize)]
pub struct DocReport {
    pub doc_id: DocId,
    pub title: Option<String>,
    pub neighbors: Option<NeighborRecord>,
    pub rank: Option<f64>,
}

pub fn show(store_dir: &Path, doc_id: DocId) -> Result<DocReport> {
    let store = Store::open(store_dir)?;
    let doc = store
        .document(doc_id)?
        .with_context(|| format!("document {doc_id} not found"))?;
    Ok(DocReport {
        doc_id,
        title: doc.title,
        neighbors: store.neighbors(doc_id)?,
        rank: store.rank(doc_id)?,
    })
}

#[derive(Debug, Serialize)]
pub struct RankedDoc {
    pub doc_id: DocId,
    pub title: Option<String>,
    pub rank: f64,
}

pub fn top(store_dir: &Path, k: usize) -> Result<Vec<RankedDoc>> {
    let store = Store::open(store_dir)?;
    let mut out = Vec::new();
    for (doc_id, rank) in store.top_ranked(k)? {
        let title = store.document(doc_id)?.and_then(|d| d.title);
        out.push(RankedDoc { doc_id, title, rank });
    }
    Ok(out)
}

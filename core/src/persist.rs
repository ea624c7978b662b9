use crate::error::{EngineError, WriteError};
use crate::index::{Corpus, Document, RawDocument};
use crate::rank::top_ranked;
use crate::sink::ResultSink;
use crate::source::CorpusSource;
use crate::DocId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const STORE_VERSION: u32 = 1;

const DOCUMENTS: &str = "documents";
const NEIGHBORS: &str = "neighbors";
const RANKS: &str = "ranks";
const META: &str = "meta";
const LAST_RUN: &[u8] = b"last_run";

/// Summary of the last run written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub num_docs: u32,
    pub processed: u32,
    pub skipped: u32,
    /// The run was interrupted before every document was attempted.
    #[serde(default)]
    pub cancelled: bool,
    pub threshold: f64,
    pub epsilon: f64,
    pub finished_at: String,
    pub version: u32,
}

/// Persisted neighbor list of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub doc_id: DocId,
    pub neighbors: Vec<DocId>,
    /// RFC 3339; set on the first write and kept across reruns.
    pub created_at: String,
    /// RFC 3339; time of the latest write.
    pub updated_at: String,
}

/// sled-backed document store: the corpus goes in through [`Store::import`]
/// and results come back through the [`ResultSink`] impl.
///
/// Keys are big-endian document ids, so scans return documents in id order.
/// The database is flushed when the store is dropped.
pub struct Store {
    db: sled::Db,
    documents: sled::Tree,
    neighbors: sled::Tree,
    ranks: sled::Tree,
    meta: sled::Tree,
}

#[inline]
fn key(doc_id: DocId) -> [u8; 4] { doc_id.to_be_bytes() }

fn doc_id_from_key(k: &[u8]) -> Result<DocId> {
    let bytes: [u8; 4] = k.try_into().context("malformed document key")?;
    Ok(DocId::from_be_bytes(bytes))
}

fn rank_from_bytes(v: &[u8]) -> Result<f64> {
    let bytes: [u8; 8] = v.try_into().context("malformed rank value")?;
    Ok(f64::from_be_bytes(bytes))
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening store at {}", path.display()))?;
        let documents = db.open_tree(DOCUMENTS)?;
        let neighbors = db.open_tree(NEIGHBORS)?;
        let ranks = db.open_tree(RANKS)?;
        let meta = db.open_tree(META)?;
        tracing::debug!(path = %path.display(), documents = documents.len(), "store opened");
        Ok(Self { db, documents, neighbors, ranks, meta })
    }

    /// Validate the whole source, then write every document. Nothing is
    /// written if any document breaks the token map contract.
    pub fn import<S: CorpusSource + ?Sized>(
        &self,
        source: &S,
    ) -> std::result::Result<usize, EngineError> {
        let corpus = Corpus::load(source)?;
        for doc in corpus.documents() {
            self.put_document(doc).map_err(EngineError::corpus_load)?;
        }
        self.flush().map_err(EngineError::corpus_load)?;
        tracing::info!(num_docs = corpus.len(), "imported documents");
        Ok(corpus.len())
    }

    pub fn put_document(&self, doc: &Document) -> Result<()> {
        let bytes = bincode::serialize(doc)?;
        self.documents.insert(key(doc.id), bytes)?;
        Ok(())
    }

    pub fn document(&self, doc_id: DocId) -> Result<Option<Document>> {
        match self.documents.get(key(doc_id))? {
            Some(v) => Ok(Some(bincode::deserialize(&v)?)),
            None => Ok(None),
        }
    }

    pub fn num_documents(&self) -> usize { self.documents.len() }

    pub fn neighbors(&self, doc_id: DocId) -> Result<Option<NeighborRecord>> {
        match self.neighbors.get(key(doc_id))? {
            Some(v) => Ok(Some(bincode::deserialize(&v)?)),
            None => Ok(None),
        }
    }

    pub fn rank(&self, doc_id: DocId) -> Result<Option<f64>> {
        match self.ranks.get(key(doc_id))? {
            Some(v) => Ok(Some(rank_from_bytes(&v)?)),
            None => Ok(None),
        }
    }

    /// All stored ranks in id order.
    pub fn ranks(&self) -> Result<Vec<(DocId, f64)>> {
        let mut out = Vec::with_capacity(self.ranks.len());
        for kv in self.ranks.iter() {
            let (k, v) = kv?;
            out.push((doc_id_from_key(&k)?, rank_from_bytes(&v)?));
        }
        Ok(out)
    }

    /// The `k` highest stored ranks; ties keep id order.
    pub fn top_ranked(&self, k: usize) -> Result<Vec<(DocId, f64)>> {
        Ok(top_ranked(self.ranks()?, k, |(_, rank)| *rank))
    }

    pub fn save_meta(&self, meta: &RunMeta) -> Result<()> {
        let json = serde_json::to_vec_pretty(meta)?;
        self.meta.insert(LAST_RUN, json)?;
        Ok(())
    }

    pub fn load_meta(&self) -> Result<Option<RunMeta>> {
        match self.meta.get(LAST_RUN)? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.db.flush() {
            tracing::warn!(error = %err, "failed to flush store on close");
        }
    }
}

impl CorpusSource for Store {
    fn fetch_all(&self) -> Result<Vec<RawDocument>> {
        let mut docs = Vec::with_capacity(self.documents.len());
        for kv in self.documents.iter() {
            let (_, v) = kv?;
            let doc: Document = bincode::deserialize(&v)?;
            let tokens = doc
                .tokens
                .iter()
                .map(|(t, c)| -> Result<(String, i64)> {
                    Ok((t.to_string(), i64::try_from(c).context("stored count out of range")?))
                })
                .collect::<Result<_>>()?;
            docs.push(RawDocument { id: doc.id, title: doc.title, tokens });
        }
        Ok(docs)
    }
}

impl ResultSink for Store {
    fn store_neighbors(
        &self,
        doc_id: DocId,
        neighbors: &[DocId],
        timestamp: OffsetDateTime,
    ) -> std::result::Result<(), WriteError> {
        let now = timestamp.format(&Rfc3339).map_err(|e| WriteError::Rejected(e.to_string()))?;
        let created_at = match self.neighbors.get(key(doc_id))? {
            Some(v) => bincode::deserialize::<NeighborRecord>(&v)?.created_at,
            None => now.clone(),
        };
        let record =
            NeighborRecord { doc_id, neighbors: neighbors.to_vec(), created_at, updated_at: now };
        self.neighbors.insert(key(doc_id), bincode::serialize(&record)?)?;
        Ok(())
    }

    fn store_rank(&self, doc_id: DocId, rank: f64) -> std::result::Result<(), WriteError> {
        if !rank.is_finite() {
            return Err(WriteError::Rejected(format!("rank {rank} is not finite")));
        }
        self.ranks.insert(key(doc_id), rank.to_be_bytes().to_vec())?;
        Ok(())
    }
}

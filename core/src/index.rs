use crate::error::{EngineError, Result};
use crate::source::CorpusSource;
use crate::tokens::{RawTokenMap, TokenFrequencyMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DocId = u32;

/// A document as supplied by the tokenizer, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: DocId,
    #[serde(default)]
    pub title: Option<String>,
    pub tokens: RawTokenMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: Option<String>,
    pub tokens: TokenFrequencyMap,
}

impl Document {
    pub fn new(id: DocId, tokens: TokenFrequencyMap) -> Self {
        Self { id, title: None, tokens }
    }

    pub fn validate(raw: RawDocument) -> Result<Self> {
        let tokens = TokenFrequencyMap::from_raw(raw.id, raw.tokens)?;
        Ok(Self { id: raw.id, title: raw.title, tokens })
    }
}

/// Every document of one run, resident in memory and frozen.
#[derive(Debug, Default)]
pub struct Corpus {
    docs: Vec<Document>,
    positions: HashMap<DocId, usize>, // id -> index into docs
}

impl Corpus {
    /// Load and validate the full corpus from `source`. Nothing is returned
    /// unless every document was read and passed validation.
    pub fn load<S: CorpusSource + ?Sized>(source: &S) -> Result<Self> {
        let raw = source.fetch_all().map_err(EngineError::corpus_load)?;
        let docs = raw.into_iter().map(Document::validate).collect::<Result<Vec<_>>>()?;
        let corpus = Self::from_documents(docs)?;
        tracing::info!(num_docs = corpus.len(), "corpus loaded");
        Ok(corpus)
    }

    /// Build from already-validated documents, keeping their order.
    pub fn from_documents(docs: Vec<Document>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(docs.len());
        for (pos, doc) in docs.iter().enumerate() {
            if positions.insert(doc.id, pos).is_some() {
                return Err(EngineError::DuplicateDocument { doc_id: doc.id });
            }
        }
        Ok(Self { docs, positions })
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.positions.get(&id).map(|&pos| &self.docs[pos])
    }

    /// Position of `id` in iteration order.
    pub fn position(&self, id: DocId) -> Option<usize> { self.positions.get(&id).copied() }

    pub fn documents(&self) -> &[Document] { &self.docs }

    /// (id, token map) pairs in load order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &TokenFrequencyMap)> {
        self.docs.iter().map(|d| (d.id, &d.tokens))
    }
}

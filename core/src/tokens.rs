use crate::error::{EngineError, Result};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token counts exactly as the tokenizer handed them over. Signed so that a
/// broken upstream map can be reported instead of silently wrapping.
pub type RawTokenMap = HashMap<String, i64>;

/// Mapping from token to occurrence count. Every stored count is >= 1; a
/// token that is absent has count 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenFrequencyMap(HashMap<String, u64>);

impl TokenFrequencyMap {
    pub fn new() -> Self { Self::default() }

    /// Validate a raw map for document `doc_id`, rejecting any count <= 0.
    pub fn from_raw(doc_id: DocId, raw: RawTokenMap) -> Result<Self> {
        let mut counts = HashMap::with_capacity(raw.len());
        for (token, count) in raw {
            if count <= 0 {
                return Err(EngineError::NonPositiveCount { doc_id, token, count });
            }
            counts.insert(token, count as u64);
        }
        Ok(Self(counts))
    }

    pub fn get(&self, token: &str) -> Option<u64> { self.0.get(token).copied() }

    pub fn contains(&self, token: &str) -> bool { self.0.contains_key(token) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(t, c)| (t.as_str(), *c))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for TokenFrequencyMap {
    /// Zero counts are dropped so the collected map keeps its invariant.
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for (token, count) in iter {
            if count > 0 {
                *counts.entry(token.into()).or_insert(0) += count;
            }
        }
        Self(counts)
    }
}

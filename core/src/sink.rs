use crate::error::WriteError;
use crate::DocId;
use parking_lot::Mutex;
use std::collections::HashMap;
use time::OffsetDateTime;

/// Where the engine hands each document's results. Called concurrently from
/// worker threads; the two writes for a document are not transactional.
pub trait ResultSink: Send + Sync {
    fn store_neighbors(
        &self,
        doc_id: DocId,
        neighbors: &[DocId],
        timestamp: OffsetDateTime,
    ) -> Result<(), WriteError>;
    fn store_rank(&self, doc_id: DocId, rank: f64) -> Result<(), WriteError>;
}

/// In-memory sink for dry runs and tests.
#[derive(Default)]
pub struct MemorySink {
    neighbors: Mutex<HashMap<DocId, (Vec<DocId>, OffsetDateTime)>>,
    ranks: Mutex<HashMap<DocId, f64>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn neighbors(&self, doc_id: DocId) -> Option<Vec<DocId>> {
        self.neighbors.lock().get(&doc_id).map(|(n, _)| n.clone())
    }

    pub fn rank(&self, doc_id: DocId) -> Option<f64> { self.ranks.lock().get(&doc_id).copied() }

    pub fn num_neighbor_records(&self) -> usize { self.neighbors.lock().len() }

    pub fn num_ranks(&self) -> usize { self.ranks.lock().len() }
}

impl ResultSink for MemorySink {
    fn store_neighbors(
        &self,
        doc_id: DocId,
        neighbors: &[DocId],
        timestamp: OffsetDateTime,
    ) -> Result<(), WriteError> {
        self.neighbors.lock().insert(doc_id, (neighbors.to_vec(), timestamp));
        Ok(())
    }

    fn store_rank(&self, doc_id: DocId, rank: f64) -> Result<(), WriteError> {
        self.ranks.lock().insert(doc_id, rank);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_overwrites() {
        let sink = MemorySink::new();
        let now = OffsetDateTime::now_utc();
        sink.store_neighbors(1, &[2, 3], now).unwrap();
        sink.store_neighbors(1, &[3], now).unwrap();
        sink.store_rank(1, 0.5).unwrap();
        assert_eq!(sink.neighbors(1), Some(vec![3]));
        assert_eq!(sink.rank(1), Some(0.5));
        assert_eq!(sink.num_neighbor_records(), 1);
        assert!(sink.rank(2).is_none());
    }
}

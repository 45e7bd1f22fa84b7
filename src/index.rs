//! In-memory vector index.
//!
//! Brute-force cosine similarity over all stored vectors, which is exact
//! and plenty fast at the document counts a single process holds. Entries
//! are append-only for the life of the process; [`VectorIndex::clear`]
//! exists for test isolation.
//!
//! The index is plain data; callers wrap it in a lock for shared access.

use crate::embedding::cosine_similarity;
use crate::error::{CoreError, CoreResult};
use crate::models::Chunk;

struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Exact nearest-neighbor index over embedded chunks.
pub struct VectorIndex {
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index accepting vectors of the given dimensionality.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Insert a chunk with its embedding. Fails if the embedding's
    /// dimensionality does not match the index.
    pub fn insert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> CoreResult<()> {
        if embedding.len() != self.dims {
            return Err(CoreError::InvalidArgument(format!(
                "embedding dimensionality mismatch: index expects {}, got {}",
                self.dims,
                embedding.len()
            )));
        }
        self.entries.push(IndexEntry { chunk, embedding });
        Ok(())
    }

    /// Insert a batch of chunks all-or-nothing: every embedding's
    /// dimensionality is checked before any entry is stored, so a bad
    /// batch leaves the index exactly as it was.
    pub fn insert_all(&mut self, items: Vec<(Chunk, Vec<f32>)>) -> CoreResult<()> {
        for (_, embedding) in &items {
            if embedding.len() != self.dims {
                return Err(CoreError::InvalidArgument(format!(
                    "embedding dimensionality mismatch: index expects {}, got {}",
                    self.dims,
                    embedding.len()
                )));
            }
        }
        for (chunk, embedding) in items {
            self.entries.push(IndexEntry { chunk, embedding });
        }
        Ok(())
    }

    /// Top-k nearest chunks by descending cosine similarity.
    ///
    /// Ties break by insertion order (earlier chunk wins), so results are
    /// deterministic. An empty index returns an empty vector; `k == 0` is
    /// an [`CoreError::InvalidArgument`].
    pub fn search(&self, query: &[f32], k: usize) -> CoreResult<Vec<(Chunk, f32)>> {
        if k == 0 {
            return Err(CoreError::InvalidArgument("k must be > 0".into()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(CoreError::InvalidArgument(format!(
                "query dimensionality mismatch: index expects {}, got {}",
                self.dims,
                query.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.entries[i].chunk.clone(), score))
            .collect())
    }

    /// Number of indexed chunks.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Reset to empty. Used by tests.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc1".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            offset: 0,
            hash: String::new(),
        }
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = VectorIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_k_is_invalid() {
        let index = VectorIndex::new(3);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 0),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_insert_rejects_wrong_dims() {
        let mut index = VectorIndex::new(3);
        let err = index.insert(make_chunk("c1", "text"), vec![1.0, 0.0]);
        assert!(matches!(err, Err(CoreError::InvalidArgument(_))));
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn test_query_dims_checked_when_nonempty() {
        let mut index = VectorIndex::new(2);
        index.insert(make_chunk("c1", "a"), vec![1.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_ranked_by_similarity() {
        let mut index = VectorIndex::new(2);
        index.insert(make_chunk("far", "a"), vec![0.0, 1.0]).unwrap();
        index.insert(make_chunk("near", "b"), vec![1.0, 0.0]).unwrap();
        index.insert(make_chunk("mid", "c"), vec![1.0, 1.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_k_truncates() {
        let mut index = VectorIndex::new(2);
        for i in 0..10 {
            index
                .insert(make_chunk(&format!("c{}", i), "t"), vec![1.0, i as f32])
                .unwrap();
        }
        assert_eq!(index.search(&[1.0, 0.0], 4).unwrap().len(), 4);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut index = VectorIndex::new(2);
        index.insert(make_chunk("first", "a"), vec![1.0, 0.0]).unwrap();
        index.insert(make_chunk("second", "b"), vec![2.0, 0.0]).unwrap();
        index.insert(make_chunk("third", "c"), vec![0.5, 0.0]).unwrap();

        // All three are colinear with the query: identical cosine scores.
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_insert_all_is_all_or_nothing() {
        let mut index = VectorIndex::new(2);
        let err = index.insert_all(vec![
            (make_chunk("c1", "a"), vec![1.0, 0.0]),
            (make_chunk("c2", "b"), vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(err, Err(CoreError::InvalidArgument(_))));
        assert_eq!(index.size(), 0);

        index
            .insert_all(vec![
                (make_chunk("c1", "a"), vec![1.0, 0.0]),
                (make_chunk("c2", "b"), vec![0.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(index.size(), 2);
    }

    #[test]
    fn test_clear_resets() {
        let mut index = VectorIndex::new(2);
        index.insert(make_chunk("c1", "a"), vec![1.0, 0.0]).unwrap();
        assert_eq!(index.size(), 1);
        index.clear();
        assert_eq!(index.size(), 0);
        assert!(index.search(&[1.0, 0.0], 1).unwrap().is_empty());
    }
}

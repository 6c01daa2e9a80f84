pub mod store;

use serde::{Deserialize, Serialize};

use crate::embedding::dot;
use crate::pipeline::intent::Intent;

/// A bounded slice of a corpus document, the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text submitted to the embedding model.
    pub content: String,
    /// File name of the originating document.
    pub source: String,
    /// Corpus bucket the document lives in.
    pub bucket: String,
    /// Intent the bucket maps to.
    pub intent: Intent,
    /// Sequential chunk index within the source document (0-based).
    pub chunk_index: usize,
}

/// A search hit: position in the index plus its cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIdx {
    pub idx: usize,
    pub score: f32,
}

/// Unit-normalized vectors with a parallel metadata table.
///
/// Vector `i` and `chunks[i]` describe the same chunk. The index is built
/// wholesale and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusIndex {
    dimension: usize,
    /// Row-major `len() * dimension` values.
    vectors: Vec<f32>,
    chunks: Vec<DocumentChunk>,
}

impl CorpusIndex {
    /// An index with no entries but a fixed dimension.
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Assemble an index from already-normalized vectors.
    ///
    /// Fails unless there is exactly one vector per chunk and every vector
    /// has length `dimension`.
    pub fn from_parts(
        dimension: usize,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<DocumentChunk>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            vectors.len() == chunks.len(),
            "vector count {} does not match metadata count {}",
            vectors.len(),
            chunks.len()
        );
        let mut flat = Vec::with_capacity(vectors.len() * dimension);
        for (i, vector) in vectors.into_iter().enumerate() {
            anyhow::ensure!(
                vector.len() == dimension,
                "vector {i} has dimension {}, expected {dimension}",
                vector.len()
            );
            flat.extend(vector);
        }
        Ok(Self {
            dimension,
            vectors: flat,
            chunks,
        })
    }

    /// Assemble an index from a flat row-major buffer (as read from disk).
    pub(crate) fn from_flat(
        dimension: usize,
        vectors: Vec<f32>,
        chunks: Vec<DocumentChunk>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            vectors.len() == chunks.len() * dimension,
            "vector buffer holds {} values, expected {} entries of dimension {dimension}",
            vectors.len(),
            chunks.len()
        );
        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// Metadata record for index id `idx`, if it exists.
    pub fn chunk(&self, idx: usize) -> Option<&DocumentChunk> {
        self.chunks.get(idx)
    }

    /// Stored vector for index id `idx`, if it exists.
    pub fn vector(&self, idx: usize) -> Option<&[f32]> {
        if self.dimension == 0 || idx >= self.len() {
            return None;
        }
        let start = idx * self.dimension;
        Some(&self.vectors[start..start + self.dimension])
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Exhaustive inner-product search returning the `n` best entries in
    /// descending score order. Ties keep index order.
    ///
    /// `query` must be unit-normalized and of the index dimension.
    pub fn search(&self, query: &[f32], n: usize) -> anyhow::Result<Vec<ScoredIdx>> {
        anyhow::ensure!(
            query.len() == self.dimension,
            "query embedding has dimension {}, index expects {}",
            query.len(),
            self.dimension
        );
        if n == 0 || self.is_empty() || self.dimension == 0 {
            return Ok(Vec::new());
        }
        let mut scored: Vec<ScoredIdx> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(idx, v)| ScoredIdx {
                idx,
                score: dot(v, query),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.idx.cmp(&b.idx)));
        scored.truncate(n);
        Ok(scored)
    }
}

pub mod embedder;
pub mod openai;

/// Provider interface for fixed-dimension text embeddings.
///
/// The same provider (and model) must be used to build an index and to embed
/// queries against it.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The returned vectors are in input order, one
    /// per text.
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embedding dimension produced by this provider.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text])?;
        anyhow::ensure!(
            embeddings.len() == 1,
            "embedding provider returned {} vectors for 1 input",
            embeddings.len()
        );
        Ok(embeddings.swap_remove(0))
    }
}

/// Scale `vector` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

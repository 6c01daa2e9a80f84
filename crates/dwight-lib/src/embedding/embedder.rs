use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use fastembed::{
    InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::EMBEDDING_DIMENSION;

/// Subdirectory name under `model_cache_dir` for all-MiniLM-L6-v2 files.
pub const MODEL_SUBDIR: &str = "all-minilm-l6-v2";

/// Files expected in `model_cache_dir/all-minilm-l6-v2/`.
pub const MODEL_FILES: &[&str] = &[
    "model.onnx",
    "tokenizer.json",
    "config.json",
    "special_tokens_map.json",
    "tokenizer_config.json",
];

/// Local embedding provider around fastembed's `TextEmbedding`.
/// Uses all-MiniLM-L6-v2 (mean pooling, 384 dimensions) loaded from disk.
pub struct LocalEmbedder {
    // fastembed needs `&mut` to run inference; the provider is shared across
    // request handlers.
    model: Mutex<TextEmbedding>,
}

impl LocalEmbedder {
    /// Load all-MiniLM-L6-v2 from `model_cache_dir/all-minilm-l6-v2/`.
    ///
    /// If the model files are not found, returns an error instructing the
    /// user to run `dwight model download`.
    pub fn new(model_cache_dir: &Path) -> anyhow::Result<Self> {
        let base = model_cache_dir.join(MODEL_SUBDIR);

        let onnx_bytes = fs::read(base.join("model.onnx")).with_context(|| {
            format!(
                "Model not found at {}. Run 'dwight model download' first.",
                base.display()
            )
        })?;

        let tokenizer_files = TokenizerFiles {
            tokenizer_file: fs::read(base.join("tokenizer.json"))
                .context("Missing tokenizer.json")?,
            config_file: fs::read(base.join("config.json")).context("Missing config.json")?,
            special_tokens_map_file: fs::read(base.join("special_tokens_map.json"))
                .context("Missing special_tokens_map.json")?,
            tokenizer_config_file: fs::read(base.join("tokenizer_config.json"))
                .context("Missing tokenizer_config.json")?,
        };

        let user_model =
            UserDefinedEmbeddingModel::new(onnx_bytes, tokenizer_files).with_pooling(Pooling::Mean);

        let model =
            TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
                .context("Failed to initialize all-MiniLM-L6-v2 model")?;

        debug!(model_dir = %base.display(), "Loaded local embedding model");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl EmbeddingProvider for LocalEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let owned: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("Embedding model lock poisoned"))?;
        let embeddings = model.embed(owned, None).context("Failed to embed texts")?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::model_cache_dir;

    // These tests need the model files; run `dwight model download` and
    // pass `--ignored` to include them.

    #[test]
    #[ignore = "requires downloaded model files"]
    fn embed_batch_returns_correct_count() {
        let embedder = LocalEmbedder::new(&model_cache_dir()).unwrap();
        let embeddings = embedder
            .embed_batch(&["container tracking", "customs clearance"])
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), EMBEDDING_DIMENSION);
        assert_eq!(embeddings[1].len(), EMBEDDING_DIMENSION);
    }

    #[test]
    #[ignore = "requires downloaded model files"]
    fn embed_single_text() {
        let embedder = LocalEmbedder::new(&model_cache_dir()).unwrap();
        let embedding = embedder.embed("test").unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn missing_model_reports_download_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalEmbedder::new(tmp.path()).err().unwrap();
        assert!(err.to_string().contains("dwight model download"));
    }
}

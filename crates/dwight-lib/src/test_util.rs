//! Deterministic providers for tests. Compiled for this crate's own tests and
//! for downstream crates that enable the `test-util` feature.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::default_model_cache_dir;
use crate::embedding::EmbeddingProvider;
use crate::generation::GenerationProvider;

/// Bag-of-words embedder: each lowercased alphanumeric token is hashed
/// (FNV-1a) into one of `dimension` buckets. Texts sharing words get
/// positive cosine similarity; texts sharing none score zero.
pub struct HashingEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let slot = fnv1a(&token.to_lowercase()) % self.dimension as u64;
            vector[usize::try_from(slot).unwrap()] += 1.0;
        }
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Embedder whose every call fails, standing in for an unreachable backend.
pub struct FailingEmbedder {
    pub dimension: usize,
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding backend unavailable")
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedder that drops the last vector of every batch.
pub struct MisalignedEmbedder {
    pub dimension: usize,
}

impl EmbeddingProvider for MisalignedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let keep = texts.len().saturating_sub(1);
        Ok(vec![vec![1.0; self.dimension]; keep])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Generator that answers with a fixed reply and remembers the last prompt
/// it was given.
pub struct StubGenerator {
    reply: String,
    last_system_prompt: Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_system_prompt: Mutex::new(None),
        }
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_system_prompt.lock().unwrap().clone()
    }
}

impl GenerationProvider for StubGenerator {
    fn complete(
        &self,
        system_prompt: &str,
        _user_query: &str,
        _temperature: f32,
        _max_tokens: usize,
    ) -> anyhow::Result<String> {
        *self.last_system_prompt.lock().unwrap() = Some(system_prompt.to_string());
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Generator whose every call fails.
pub struct FailingGenerator;

impl GenerationProvider for FailingGenerator {
    fn complete(
        &self,
        _system_prompt: &str,
        _user_query: &str,
        _temperature: f32,
        _max_tokens: usize,
    ) -> anyhow::Result<String> {
        anyhow::bail!("generation backend unavailable")
    }

    fn model(&self) -> &str {
        "failing"
    }
}

/// Where tests that need the real ONNX files look for them: `DWIGHT_MODEL_DIR`
/// if set, otherwise the regular model cache.
pub fn model_cache_dir() -> PathBuf {
    std::env::var_os("DWIGHT_MODEL_DIR").map_or_else(default_model_cache_dir, PathBuf::from)
}

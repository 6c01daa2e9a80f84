use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::embedding::{EmbeddingProvider, normalize_l2};
use crate::index::{CorpusIndex, DocumentChunk, store};
use crate::pipeline::chunker::Chunker;
use crate::pipeline::intent::Intent;

/// Corpus buckets and the intent each one serves, in ingestion order.
pub const BUCKETS: &[(&str, Intent)] = &[
    ("1_customer_support", Intent::Support),
    ("2_services_pricing", Intent::Support),
    ("3_sales_process", Intent::Sales),
    ("4_internal_policies", Intent::Internal),
];

/// Extension of files eligible for ingestion.
const DOCUMENT_EXTENSION: &str = "md";

/// Intent served by `bucket`, if it is a known bucket.
pub fn bucket_intent(bucket: &str) -> Option<Intent> {
    BUCKETS
        .iter()
        .find(|(name, _)| *name == bucket)
        .map(|(_, intent)| *intent)
}

/// Read and chunk every eligible document under `data_dir`.
///
/// Missing buckets are skipped. A document that cannot be read is logged and
/// skipped; the rest of the corpus is still ingested.
pub fn load_corpus(data_dir: &Path, chunker: &Chunker) -> anyhow::Result<Vec<DocumentChunk>> {
    let mut chunks = Vec::new();
    for &(bucket, intent) in BUCKETS {
        let bucket_dir = data_dir.join(bucket);
        if !bucket_dir.is_dir() {
            debug!(bucket, dir = %bucket_dir.display(), "Bucket missing, skipping");
            continue;
        }

        for path in documents_in(&bucket_dir)? {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read document, skipping");
                    continue;
                }
            };
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let before = chunks.len();
            chunks.extend(
                chunker
                    .chunks(&text)
                    .enumerate()
                    .map(|(chunk_index, content)| DocumentChunk {
                        content,
                        source: source.clone(),
                        bucket: bucket.to_string(),
                        intent,
                        chunk_index,
                    }),
            );
            debug!(bucket, source = %source, chunks = chunks.len() - before, "Chunked document");
        }
    }
    Ok(chunks)
}

/// Eligible files directly inside `dir`, in sorted path order.
fn documents_in(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Embed `chunks` in batches and assemble a unit-normalized index.
///
/// Any batch failure, count mismatch, or dimension mismatch fails the whole
/// build; no partial index is returned.
pub fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<DocumentChunk>,
    batch_size: usize,
) -> anyhow::Result<CorpusIndex> {
    let dimension = provider.dimension();
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(chunks.len());

    for (batch_idx, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
        let embedded = provider
            .embed_batch(&texts)
            .with_context(|| format!("Failed to embed batch {batch_idx}"))?;
        anyhow::ensure!(
            embedded.len() == texts.len(),
            "embedding provider returned {} vectors for {} chunks in batch {batch_idx}",
            embedded.len(),
            texts.len()
        );
        for mut vector in embedded {
            anyhow::ensure!(
                vector.len() == dimension,
                "embedding provider returned dimension {}, expected {dimension}",
                vector.len()
            );
            normalize_l2(&mut vector);
            vectors.push(vector);
        }
        debug!(batch = batch_idx, size = texts.len(), "Embedded batch");
    }

    CorpusIndex::from_parts(dimension, vectors, chunks)
}

/// Read, chunk, and embed the whole corpus without touching persisted state.
///
/// An empty corpus yields an empty index with the provider's dimension.
pub fn build_index(
    provider: &dyn EmbeddingProvider,
    config: &RagConfig,
) -> anyhow::Result<CorpusIndex> {
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
    let chunks = load_corpus(&config.data_dir, &chunker)?;
    if chunks.is_empty() {
        warn!(data_dir = %config.data_dir.display(), "Corpus is empty, index will be empty");
        return Ok(CorpusIndex::empty(provider.dimension()));
    }
    let index = embed_chunks(provider, chunks, config.embed_batch_size)?;
    info!(
        chunks = index.len(),
        dimension = index.dimension(),
        model = %config.embedding_model,
        "Built index"
    );
    Ok(index)
}

/// Rebuild the index from the corpus and persist it, replacing any previous
/// artifacts.
///
/// An empty index is not persisted, and stale artifacts are removed so a
/// later startup retries the build.
pub fn rebuild(provider: &dyn EmbeddingProvider, config: &RagConfig) -> anyhow::Result<CorpusIndex> {
    let index = build_index(provider, config)?;
    if index.is_empty() {
        remove_artifacts(&config.index_dir)?;
    } else {
        store::save(&index, &config.index_dir)?;
        info!(dir = %config.index_dir.display(), "Persisted index");
    }
    Ok(index)
}

/// Load the persisted index, or rebuild it when artifacts are missing,
/// corrupt, or were built for a different embedding dimension.
pub fn load_or_build(
    provider: &dyn EmbeddingProvider,
    config: &RagConfig,
) -> anyhow::Result<CorpusIndex> {
    match store::load(&config.index_dir) {
        Ok(Some(index)) if index.dimension() == provider.dimension() => {
            info!(
                dir = %config.index_dir.display(),
                chunks = index.len(),
                "Loaded persisted index"
            );
            return Ok(index);
        }
        Ok(Some(index)) => {
            warn!(
                persisted = index.dimension(),
                provider = provider.dimension(),
                "Persisted index dimension does not match provider, rebuilding"
            );
        }
        Ok(None) => {
            info!(dir = %config.index_dir.display(), "No persisted index, building");
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Persisted index is corrupt, rebuilding");
        }
    }
    rebuild(provider, config)
}

fn remove_artifacts(dir: &Path) -> anyhow::Result<()> {
    let (vectors, documents) = store::artifact_paths(dir);
    for path in [vectors, documents] {
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale {}", path.display()))?;
        }
    }
    Ok(())
}

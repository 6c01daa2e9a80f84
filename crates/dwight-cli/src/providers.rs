use std::sync::Arc;

use anyhow::Context;

use dwight_lib::embedding::EmbeddingProvider;
use dwight_lib::embedding::embedder::LocalEmbedder;
use dwight_lib::embedding::openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
use dwight_lib::generation::GenerationProvider;
use dwight_lib::generation::openai::{ChatCompletionsClient, ChatCompletionsConfig};

use crate::cli::{EmbeddingBackend, GlobalArgs};

/// Creates the external providers a command needs. Commands never construct
/// providers themselves, so tests can hand in deterministic ones.
pub trait ProviderFactory {
    fn embedder(&self, args: &GlobalArgs) -> anyhow::Result<Arc<dyn EmbeddingProvider>>;
    fn generator(&self, args: &GlobalArgs) -> anyhow::Result<Arc<dyn GenerationProvider>>;
}

/// Providers selected by command-line configuration.
pub struct ConfiguredProviders;

impl ProviderFactory for ConfiguredProviders {
    fn embedder(&self, args: &GlobalArgs) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match args.embedding_provider {
            EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedder::new(&args.model_cache_dir())?)),
            EmbeddingBackend::Openai => {
                let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig {
                    api_key: args.embedding_api_key.clone(),
                    base_url: args.embedding_base_url.clone(),
                    model: args.embedding_model.clone(),
                    dimension: args.embedding_dimension,
                    timeout: args.request_timeout(),
                    max_retries: args.max_retries,
                    batch_size: args.embed_batch_size,
                })
                .context("Failed to configure remote embeddings")?;
                Ok(Arc::new(embedder))
            }
        }
    }

    fn generator(&self, args: &GlobalArgs) -> anyhow::Result<Arc<dyn GenerationProvider>> {
        let client = ChatCompletionsClient::new(ChatCompletionsConfig {
            api_key: args.llm_api_key.clone().unwrap_or_default(),
            base_url: args.llm_base_url.clone(),
            model: args.llm_model.clone(),
            timeout: args.request_timeout(),
            max_retries: args.max_retries,
        })?;
        Ok(Arc::new(client))
    }
}

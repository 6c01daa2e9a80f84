pub mod chat;
pub mod classify;
pub mod ingest;
pub mod model;
pub mod query;
pub mod serve;

use std::sync::Arc;

use dwight_lib::chat::ChatService;
use dwight_lib::generation::prompts::PromptLibrary;
use dwight_lib::pipeline::ingest::load_or_build;
use dwight_lib::pipeline::retrieve::Retriever;

use crate::cli::GlobalArgs;
use crate::providers::ProviderFactory;

/// Load the persisted index (building it if needed) behind a retriever.
pub fn open_retriever(
    args: &GlobalArgs,
    providers: &dyn ProviderFactory,
) -> anyhow::Result<Retriever> {
    let embedder = providers.embedder(args)?;
    let index = load_or_build(embedder.as_ref(), &args.rag_config())?;
    Ok(Retriever::new(
        Arc::new(index),
        embedder,
        args.similarity_threshold,
    ))
}

/// Assemble the full chat pipeline from command-line settings.
pub fn chat_service(
    args: &GlobalArgs,
    providers: &dyn ProviderFactory,
) -> anyhow::Result<ChatService> {
    let generator = providers.generator(args)?;
    let retriever = open_retriever(args, providers)?;
    let generation = args.generation_config();
    let prompts = PromptLibrary::new(generation.prompts_dir.clone());
    Ok(ChatService::new(
        retriever,
        generator,
        prompts,
        generation,
        args.top_k,
    ))
}

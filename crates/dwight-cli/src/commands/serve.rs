use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use dwight_lib::lead::LeadDesk;

use crate::cli::{GlobalArgs, ServeArgs};
use crate::providers::ProviderFactory;
use crate::server::{self, AppState};

/// Build the shared state: providers, index, lead sinks.
///
/// Runs before any async runtime exists. The blocking HTTP clients inside
/// the providers must not be created or dropped on an async worker.
pub fn build_state(
    args: &GlobalArgs,
    serve: &ServeArgs,
    providers: &dyn ProviderFactory,
) -> anyhow::Result<Arc<AppState>> {
    let chat = super::chat_service(args, providers)?;
    if !chat.retriever().is_ready() {
        warn!(
            data_dir = %args.data_dir.display(),
            "Index is empty, answers will fall back to the refusal"
        );
    }
    let leads = LeadDesk::from_config(&serve.lead_config(), args.request_timeout())?;
    info!(
        chunks = chat.retriever().index().len(),
        model = chat.generator_model(),
        sinks = ?leads.remote_sinks(),
        "Service state ready"
    );

    Ok(Arc::new(AppState {
        chat: Arc::new(chat),
        leads: Arc::new(leads),
        environment: serve.environment.clone(),
        // One retrieval plus one generation, each with its own retries.
        handler_timeout: args.request_timeout() * 3,
    }))
}

/// Run the `dwight serve` command. Blocks until Ctrl-C.
pub fn run_serve(
    args: &GlobalArgs,
    serve: &ServeArgs,
    providers: &dyn ProviderFactory,
) -> anyhow::Result<()> {
    let state = build_state(args, serve, providers)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let served = runtime.block_on({
        let state = Arc::clone(&state);
        let bind = serve.bind.clone();
        async move {
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            server::serve(listener, state).await
        }
    });
    drop(runtime);
    // Last reference released here, outside the runtime.
    drop(state);
    served
}

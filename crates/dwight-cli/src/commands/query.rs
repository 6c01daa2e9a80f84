use std::io::Write;

use dwight_lib::output::ConsoleIO;
use dwight_lib::pipeline::guardrails::sanitize_input;
use dwight_lib::pipeline::intent::{Intent, classify};

use crate::cli::GlobalArgs;
use crate::providers::ProviderFactory;

/// Run the `dwight query` command: print the ranked chunks a chat turn
/// would see as context.
pub fn run_query<C: ConsoleIO>(
    text: &str,
    intent: Option<Intent>,
    k: Option<usize>,
    args: &GlobalArgs,
    providers: &dyn ProviderFactory,
    io: &mut C,
) -> anyhow::Result<()> {
    let query = sanitize_input(text);
    let intent = intent.unwrap_or_else(|| classify(&query));
    let retriever = super::open_retriever(args, providers)?;
    let results = retriever.search(&query, intent, k.unwrap_or(args.top_k))?;

    writeln!(io.stdout(), "Intent: {intent}")?;
    if results.is_empty() {
        writeln!(io.stdout(), "No relevant chunks found.")?;
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let marker = if result.intent_match { "*" } else { " " };
        writeln!(
            io.stdout(),
            "\n### {}. {}/{}#{} (score: {:.4}){marker}",
            rank + 1,
            result.chunk.bucket,
            result.chunk.source,
            result.chunk.chunk_index,
            result.score,
        )?;
        writeln!(io.stdout(), "{}", result.chunk.content)?;
    }
    Ok(())
}

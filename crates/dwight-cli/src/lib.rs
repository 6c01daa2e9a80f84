pub mod cli;
pub mod commands;
pub mod logging;
pub mod providers;
pub mod server;

#[cfg(test)]
pub mod test_util;

use clap::Parser;

use dwight_lib::output::{ConsoleIO, StdIO};

use cli::{Cli, Command, ModelCommand};
use providers::{ConfiguredProviders, ProviderFactory};

/// Process entry point: parse the real command line, install logging, run.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.global.log_format)?;
    dispatch(cli, &ConfiguredProviders, &mut StdIO::new())
}

/// Parse `args` and dispatch without touching global process state.
pub fn try_run<C: ConsoleIO>(
    args: &[&str],
    providers: &dyn ProviderFactory,
    io: &mut C,
) -> anyhow::Result<()> {
    let cli = Cli::try_parse_from(args)?;
    dispatch(cli, providers, io)
}

fn dispatch<C: ConsoleIO>(
    cli: Cli,
    providers: &dyn ProviderFactory,
    io: &mut C,
) -> anyhow::Result<()> {
    let args = &cli.global;
    match cli.command {
        Command::Ingest => commands::ingest::run_ingest(args, providers, io),
        Command::Query { text, intent, k } => {
            commands::query::run_query(&text, intent.map(Into::into), k, args, providers, io)
        }
        Command::Classify { text } => commands::classify::run_classify(&text, io),
        Command::Chat {
            message,
            session_id,
        } => commands::chat::run_chat(
            message.as_deref(),
            session_id.as_deref(),
            args,
            providers,
            io,
        ),
        Command::Serve(serve) => commands::serve::run_serve(args, &serve, providers),
        Command::Model { model_command } => match model_command {
            ModelCommand::Download { force } => {
                commands::model::run_model_download(force, &args.model_cache_dir(), io)
            }
        },
    }
}

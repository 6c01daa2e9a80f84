use std::io::Write;

use dwight_lib::output::ConsoleIO;
use dwight_lib::pipeline::ingest::rebuild;

use crate::cli::GlobalArgs;
use crate::providers::ProviderFactory;

/// Run the `dwight ingest` command.
pub fn run_ingest<C: ConsoleIO>(
    args: &GlobalArgs,
    providers: &dyn ProviderFactory,
    io: &mut C,
) -> anyhow::Result<()> {
    let embedder = providers.embedder(args)?;
    let config = args.rag_config();
    let index = rebuild(embedder.as_ref(), &config)?;

    if index.is_empty() {
        writeln!(
            io.stdout(),
            "Corpus at {} is empty; nothing persisted.",
            config.data_dir.display()
        )?;
        return Ok(());
    }

    let mut sources: Vec<&str> = index.chunks().iter().map(|c| c.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();
    writeln!(
        io.stdout(),
        "Indexed {} chunks from {} documents (dimension {}) into {}",
        index.len(),
        sources.len(),
        index.dimension(),
        config.index_dir.display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use dwight_lib::index::store;
    use dwight_lib::output::BufferedIO;
    use dwight_test_util::corpus::sample_corpus;

    use crate::test_util::{StubProviders, run_in, workspace};

    #[test]
    fn try_run_ingest_persists_index() {
        let tmp = workspace();
        sample_corpus(&tmp.path().join("data"));

        let mut io = BufferedIO::new();
        run_in(tmp.path(), &["ingest"], &StubProviders::new("unused"), &mut io).unwrap();

        let out = io.stdout_to_string();
        assert!(out.starts_with("Indexed "));
        assert!(out.contains(" chunks from 4 documents (dimension 64) into "));
        assert!(store::exists(&tmp.path().join("index")));
        assert_eq!(io.stderr_to_string(), "");
    }

    #[test]
    fn try_run_ingest_empty_corpus() {
        let tmp = workspace();

        let mut io = BufferedIO::new();
        run_in(tmp.path(), &["ingest"], &StubProviders::new("unused"), &mut io).unwrap();

        assert_eq!(
            io.stdout_to_string(),
            format!(
                "Corpus at {} is empty; nothing persisted.\n",
                tmp.path().join("data").display()
            )
        );
        assert!(!store::exists(&tmp.path().join("index")));
    }
}

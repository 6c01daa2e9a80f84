use std::path::Path;
use std::sync::Arc;

use dwight_lib::embedding::EmbeddingProvider;
use dwight_lib::generation::GenerationProvider;
use dwight_lib::output::BufferedIO;
use dwight_lib::test_util::{HashingEmbedder, StubGenerator};

use crate::cli::GlobalArgs;
use crate::providers::ProviderFactory;

/// Embedding dimension of [`StubProviders`].
pub const STUB_DIMENSION: usize = 64;

/// Deterministic providers: a hashing embedder and a canned generator.
pub struct StubProviders {
    pub generator: Arc<StubGenerator>,
}

impl StubProviders {
    pub fn new(reply: &str) -> Self {
        Self {
            generator: Arc::new(StubGenerator::new(reply)),
        }
    }
}

impl ProviderFactory for StubProviders {
    fn embedder(&self, _args: &GlobalArgs) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(HashingEmbedder::new(STUB_DIMENSION)))
    }

    fn generator(&self, _args: &GlobalArgs) -> anyhow::Result<Arc<dyn GenerationProvider>> {
        Ok(Arc::clone(&self.generator) as Arc<dyn GenerationProvider>)
    }
}

/// Empty temp directory to host `data/`, `index/` and `prompts/`.
pub fn workspace() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

/// [`crate::try_run`] with the corpus, index and prompt directories pointed
/// into `root`. `args` is everything after the program name.
pub fn run_in(
    root: &Path,
    args: &[&str],
    providers: &StubProviders,
    io: &mut BufferedIO,
) -> anyhow::Result<()> {
    let data = root.join("data").to_string_lossy().into_owned();
    let index = root.join("index").to_string_lossy().into_owned();
    let prompts = root.join("prompts").to_string_lossy().into_owned();
    let mut argv = vec!["dwight"];
    argv.extend_from_slice(args);
    argv.extend_from_slice(&[
        "--data-dir",
        data.as_str(),
        "--index-dir",
        index.as_str(),
        "--prompts-dir",
        prompts.as_str(),
    ]);
    crate::try_run(&argv, providers, io)
}

/// Strip margin markers from a multi-line string (Kotlin-style `trimMargin`).
///
/// Each line is scanned for the first `|` character after optional leading
/// whitespace. Everything before and including the `|` is removed. Lines that
/// do not contain a leading `|` are dropped.
pub fn _trim_margin(s: &str) -> String {
    s.lines()
        .filter_map(|line| line.trim_start().strip_prefix('|'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a margin-trimmed string with `format!`-style interpolation.
macro_rules! trim_margin {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::test_util::_trim_margin(&format!($fmt $(, $arg)*))
    };
}
pub(crate) use trim_margin;

#[cfg(test)]
mod tests {
    use super::_trim_margin;

    #[test]
    fn trim_margin_keeps_trailing_newline() {
        assert_eq!(
            _trim_margin(
                "|intent: sales
                 |"
            ),
            "intent: sales\n"
        );
    }
}

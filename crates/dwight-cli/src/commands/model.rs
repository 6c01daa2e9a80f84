use std::io::Write;
use std::path::Path;

use anyhow::Context;

use dwight_lib::embedding::embedder::{MODEL_FILES, MODEL_SUBDIR};
use dwight_lib::output::ConsoleIO;

/// Hugging Face repository for all-MiniLM-L6-v2.
const HF_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Path of a model file inside the Hugging Face repository.
fn remote_path(local_name: &str) -> String {
    if local_name == "model.onnx" {
        format!("onnx/{local_name}")
    } else {
        local_name.to_string()
    }
}

/// Run the `dwight model download` command.
pub fn run_model_download<C: ConsoleIO>(
    force: bool,
    model_cache_dir: &Path,
    io: &mut C,
) -> anyhow::Result<()> {
    let model_dir = model_cache_dir.join(MODEL_SUBDIR);

    if force && model_dir.exists() {
        writeln!(io.stderr(), "Removing existing model files...")?;
        std::fs::remove_dir_all(&model_dir)
            .with_context(|| format!("Failed to remove {}", model_dir.display()))?;
    }

    if !force && MODEL_FILES.iter().all(|name| model_dir.join(name).exists()) {
        writeln!(
            io.stdout(),
            "Model already downloaded at {}",
            model_dir.display()
        )?;
        return Ok(());
    }

    std::fs::create_dir_all(&model_dir)
        .with_context(|| format!("Failed to create {}", model_dir.display()))?;

    writeln!(io.stderr(), "Downloading all-MiniLM-L6-v2...")?;
    let api = hf_hub::api::sync::Api::new()?;
    let repo = api.model(HF_REPO.to_string());

    for local_name in MODEL_FILES {
        let dest = model_dir.join(local_name);
        if dest.exists() {
            writeln!(io.stderr(), "  {local_name} (cached)")?;
            continue;
        }
        writeln!(io.stderr(), "  {local_name}...")?;
        let cached = repo
            .get(&remote_path(local_name))
            .with_context(|| format!("Failed to fetch {local_name} from {HF_REPO}"))?;
        std::fs::copy(&cached, &dest)
            .with_context(|| format!("Failed to copy {local_name} into {}", model_dir.display()))?;
    }

    writeln!(io.stdout(), "Model downloaded to {}", model_dir.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use dwight_lib::embedding::embedder::{MODEL_FILES, MODEL_SUBDIR};
    use dwight_lib::output::BufferedIO;

    use super::remote_path;
    use crate::test_util::StubProviders;

    #[test]
    fn onnx_weights_live_under_onnx_dir() {
        assert_eq!(remote_path("model.onnx"), "onnx/model.onnx");
        assert_eq!(remote_path("tokenizer.json"), "tokenizer.json");
    }

    #[test]
    fn try_run_model_download_skips_complete_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join(MODEL_SUBDIR);
        std::fs::create_dir_all(&model_dir).unwrap();
        for name in MODEL_FILES {
            std::fs::write(model_dir.join(name), b"stub").unwrap();
        }

        let cache = tmp.path().to_string_lossy().into_owned();
        let mut io = BufferedIO::new();
        crate::try_run(
            &["dwight", "model", "download", "--model-dir", cache.as_str()],
            &StubProviders::new("unused"),
            &mut io,
        )
        .unwrap();

        assert_eq!(
            io.stdout_to_string(),
            format!("Model already downloaded at {}\n", model_dir.display())
        );
        assert_eq!(io.stderr_to_string(), "");
    }
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use dwight_lib::config::{
    CHUNK_OVERLAP_CHARS, CHUNK_SIZE_CHARS, DEFAULT_EMBEDDING_BASE_URL, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_BASE_URL, DEFAULT_GENERATION_MODEL, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_K, EMBED_BATCH_SIZE, EMBEDDING_DIMENSION, GenerationConfig,
    LeadConfig, RagConfig, SIMILARITY_THRESHOLD, SmtpConfig, default_model_cache_dir,
};
use dwight_lib::pipeline::intent::Intent;

#[derive(Parser, Debug)]
#[command(
    name = "dwight",
    version,
    about = "Intent-aware RAG assistant for a logistics help desk"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the vector index from the corpus and persist it.
    Ingest,

    /// Show the ranked chunks retrieved for a query.
    Query {
        /// Query text.
        text: String,
        /// Intent to rank against. Classified from the text when omitted.
        #[arg(long, value_enum)]
        intent: Option<IntentArg>,
        /// Number of chunks to return (defaults to --top-k).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Classify a message and report whether it would prompt for a lead.
    Classify {
        /// Message text.
        text: String,
    },

    /// Ask a question. Without a message, reads one question per line from
    /// stdin until EOF.
    Chat {
        message: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Serve the HTTP API.
    Serve(ServeArgs),

    /// Manage the local embedding model.
    Model {
        #[command(subcommand)]
        model_command: ModelCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// Download the embedding model files from Hugging Face.
    Download {
        /// Force re-download even if files already exist.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IntentArg {
    Support,
    Sales,
    Internal,
}

impl From<IntentArg> for Intent {
    fn from(value: IntentArg) -> Self {
        match value {
            IntentArg::Support => Self::Support,
            IntentArg::Sales => Self::Sales,
            IntentArg::Internal => Self::Internal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 run locally through ONNX Runtime.
    Local,
    /// An OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings shared by every command. Each flag falls back to a `DWIGHT_*`
/// environment variable.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Root of the bucketed markdown corpus.
    #[arg(long, global = true, env = "DWIGHT_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory holding the persisted index.
    #[arg(
        long,
        global = true,
        env = "DWIGHT_INDEX_DIR",
        default_value = "data/processed/index"
    )]
    pub index_dir: PathBuf,

    /// Directory searched for `system_<intent>.txt` prompt templates.
    #[arg(long, global = true, env = "DWIGHT_PROMPTS_DIR", default_value = "prompts")]
    pub prompts_dir: PathBuf,

    /// Local model cache (defaults to ~/.dwight/models).
    #[arg(long, global = true, env = "DWIGHT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        env = "DWIGHT_EMBEDDING_PROVIDER",
        default_value = "local"
    )]
    pub embedding_provider: EmbeddingBackend,

    #[arg(long, global = true, env = "DWIGHT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    #[arg(long, global = true, env = "DWIGHT_EMBEDDING_BASE_URL", default_value = DEFAULT_EMBEDDING_BASE_URL)]
    pub embedding_base_url: String,

    #[arg(long, global = true, env = "DWIGHT_EMBEDDING_API_KEY", default_value = "", hide_env_values = true)]
    pub embedding_api_key: String,

    /// Vector size produced by the remote embedding model.
    #[arg(long, global = true, env = "DWIGHT_EMBEDDING_DIMENSION", default_value_t = EMBEDDING_DIMENSION)]
    pub embedding_dimension: usize,

    /// Maximum chunk size in characters.
    #[arg(long, global = true, env = "DWIGHT_CHUNK_SIZE", default_value_t = CHUNK_SIZE_CHARS)]
    pub chunk_size: usize,

    /// Overlap budget in characters between split chunks.
    #[arg(long, global = true, env = "DWIGHT_CHUNK_OVERLAP", default_value_t = CHUNK_OVERLAP_CHARS)]
    pub chunk_overlap: usize,

    #[arg(long, global = true, env = "DWIGHT_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Minimum cosine similarity for a chunk to count as relevant.
    #[arg(long, global = true, env = "DWIGHT_SIMILARITY_THRESHOLD", default_value_t = SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f32,

    #[arg(long, global = true, env = "DWIGHT_EMBED_BATCH_SIZE", default_value_t = EMBED_BATCH_SIZE)]
    pub embed_batch_size: usize,

    #[arg(long, global = true, env = "DWIGHT_LLM_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    pub llm_model: String,

    #[arg(long, global = true, env = "DWIGHT_LLM_BASE_URL", default_value = DEFAULT_GENERATION_BASE_URL)]
    pub llm_base_url: String,

    #[arg(long, global = true, env = "DWIGHT_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, global = true, env = "DWIGHT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, global = true, env = "DWIGHT_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: usize,

    /// Seconds before an outbound provider request times out.
    #[arg(long, global = true, env = "DWIGHT_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Attempts per provider request, including the first.
    #[arg(long, global = true, env = "DWIGHT_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: usize,

    #[arg(
        long,
        global = true,
        value_enum,
        env = "DWIGHT_LOG_FORMAT",
        default_value = "text"
    )]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    pub fn rag_config(&self) -> RagConfig {
        RagConfig {
            embedding_model: self.embedding_model.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            embed_batch_size: self.embed_batch_size,
            data_dir: self.data_dir.clone(),
            index_dir: self.index_dir.clone(),
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.llm_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            prompts_dir: self.prompts_dir.clone(),
        }
    }

    pub fn model_cache_dir(&self) -> PathBuf {
        self.model_dir.clone().unwrap_or_else(default_model_cache_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "DWIGHT_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Deployment label reported by `/health`.
    #[arg(long, env = "DWIGHT_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Spreadsheet-append webhook that receives lead rows.
    #[arg(long, env = "DWIGHT_SHEETS_WEBHOOK_URL")]
    pub sheets_webhook_url: Option<String>,

    /// SMTP relay for lead notifications. SMTP is enabled when set.
    #[arg(long, env = "DWIGHT_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "DWIGHT_SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "DWIGHT_SMTP_USERNAME", default_value = "")]
    pub smtp_username: String,

    #[arg(long, env = "DWIGHT_SMTP_PASSWORD", default_value = "", hide_env_values = true)]
    pub smtp_password: String,

    /// Recipient of lead notification emails.
    #[arg(long, env = "DWIGHT_NOTIFICATION_EMAIL", default_value = "")]
    pub notification_email: String,

    /// Local JSON file leads fall back to.
    #[arg(long, env = "DWIGHT_LEADS_BACKUP_FILE", default_value = "leads_backup.json")]
    pub leads_backup_file: PathBuf,
}

impl ServeArgs {
    pub fn lead_config(&self) -> LeadConfig {
        let smtp = self.smtp_host.as_ref().map(|host| SmtpConfig {
            host: host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            notification_email: self.notification_email.clone(),
        });
        LeadConfig {
            sheets_webhook_url: self
                .sheets_webhook_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            smtp,
            backup_file: self.leads_backup_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dwight",
            "query",
            "rates to Dubai",
            "--top-k",
            "3",
            "--intent",
            "sales",
            "--data-dir",
            "/srv/corpus",
        ])
        .unwrap();
        assert_eq!(cli.global.top_k, 3);
        assert_eq!(cli.global.data_dir, PathBuf::from("/srv/corpus"));
        match cli.command {
            Command::Query { text, intent, k } => {
                assert_eq!(text, "rates to Dubai");
                assert_eq!(intent, Some(IntentArg::Sales));
                assert_eq!(k, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_lead_config_enables_smtp_only_with_host() {
        let cli = Cli::try_parse_from([
            "dwight",
            "serve",
            "--leads-backup-file",
            "/tmp/leads.json",
            "--sheets-webhook-url",
            " ",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let leads = args.lead_config();
        assert!(leads.smtp.is_none());
        assert!(leads.sheets_webhook_url.is_none());
        assert_eq!(leads.backup_file, PathBuf::from("/tmp/leads.json"));
    }

    #[test]
    fn intent_arg_maps_to_intent() {
        assert_eq!(Intent::from(IntentArg::Internal), Intent::Internal);
    }
}

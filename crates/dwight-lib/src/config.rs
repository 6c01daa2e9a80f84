use std::path::PathBuf;
use std::time::Duration;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIMENSION: usize = 384;

/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Maximum chunk size in characters.
pub const CHUNK_SIZE_CHARS: usize = 1000;

/// Overlap budget in characters carried between adjacent sub-chunks.
///
/// Converted to a word window of `overlap / 5` words when a section is split.
pub const CHUNK_OVERLAP_CHARS: usize = 200;

/// Default number of chunks concatenated into the retrieval context.
pub const DEFAULT_TOP_K: usize = 5;

/// Multiplier for over-fetching candidates from vector search.
///
/// The search fetches `k * OVER_FETCH_MULTIPLIER` candidates (capped at the
/// index size), then applies the threshold filter and intent rerank to
/// produce the final `k` results.
pub const OVER_FETCH_MULTIPLIER: usize = 2;

/// Minimum cosine similarity for a candidate to be considered relevant.
///
/// all-MiniLM-L6-v2 similarities for on-topic passages rarely drop below
/// 0.2, so 0.15 only discards clearly unrelated chunks.
pub const SIMILARITY_THRESHOLD: f32 = 0.15;

/// Number of chunk texts sent to the embedding provider per request.
pub const EMBED_BATCH_SIZE: usize = 100;

/// Separator placed between chunk texts in the retrieval context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Default chat-completions model.
pub const DEFAULT_GENERATION_MODEL: &str = "llama-3.1-8b-instant";

/// Default OpenAI-compatible base URL for generation (Groq).
pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default OpenAI-compatible base URL for remote embeddings (local Ollama).
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:11434/v1";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Timeout applied to every outbound provider request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry attempts for transient provider errors (including the first try).
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Maximum accepted user message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Immutable retrieval settings captured once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Identifier of the embedding model the index was built with.
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub embed_batch_size: usize,
    /// Root of the bucketed document corpus.
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector blob and metadata table.
    pub index_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: CHUNK_SIZE_CHARS,
            chunk_overlap: CHUNK_OVERLAP_CHARS,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: SIMILARITY_THRESHOLD,
            embed_batch_size: EMBED_BATCH_SIZE,
            data_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("data").join("processed").join("index"),
        }
    }
}

/// Settings for the chat-completions call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Directory searched for `system_<intent>.txt` prompt templates.
    pub prompts_dir: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            prompts_dir: PathBuf::from("prompts"),
        }
    }
}

/// SMTP notification settings. All fields are required once SMTP is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub notification_email: String,
}

/// Lead delivery settings. Each sink is independently optional.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadConfig {
    /// Spreadsheet-append webhook URL. `None` disables the sheet sink.
    pub sheets_webhook_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
    /// Local JSON file used when no remote sink accepted the lead.
    pub backup_file: PathBuf,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            sheets_webhook_url: None,
            smtp: None,
            backup_file: PathBuf::from("leads_backup.json"),
        }
    }
}

/// Default directory for downloaded embedding model files: `~/.dwight/models`.
pub fn default_model_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dwight")
        .join("models")
}

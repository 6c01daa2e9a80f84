//! HTTP surface: health probes, `/api/chat`, and `/api/lead`.
//!
//! Handlers never run pipeline work on the async workers. Every call into
//! the chat service or the lead desk goes through `spawn_blocking` and is
//! bounded by `AppState::handler_timeout`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use dwight_lib::chat::{ChatReply, ChatService};
use dwight_lib::config::MAX_MESSAGE_CHARS;
use dwight_lib::lead::{LeadDesk, LeadSubmission, redact_email};
use dwight_lib::pipeline::intent::Intent;

pub const APP_NAME: &str = "Dwight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const CHAT_FAILURE_MESSAGE: &str = "I'm having trouble processing your request. Please try again.";
const LEAD_ACCEPTED_MESSAGE: &str = "Thank you! Our team will reach out to you shortly.";
const LEAD_REJECTED_MESSAGE: &str =
    "There was an issue submitting your information. Please try again or contact us directly.";
const LEAD_FAILURE_MESSAGE: &str = "Unable to process your request. Please contact us directly.";

/// Everything the handlers share. Built once before the server starts.
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub leads: Arc<LeadDesk>,
    /// Deployment label reported by `/health`.
    pub environment: String,
    /// Upper bound on one blocking pipeline call.
    pub handler_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Intent,
    pub lead_prompt: bool,
    pub timestamp: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            intent: reply.intent,
            lead_prompt: reply.lead_prompt,
            timestamp: reply.timestamp.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeadRequest {
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub query_context: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, detail: &str) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.to_string(),
        }),
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
        .route("/api/chat", post(chat))
        .route("/api/lead", post(lead))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, version = APP_VERSION, "Serving HTTP API");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
        })
        .await
        .context("server shutdown")
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": APP_NAME,
        "version": APP_VERSION,
        "status": "operational",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": jiff::Timestamp::now().to_string(),
        "version": APP_VERSION,
        "environment": state.environment,
    }))
}

async fn ready(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let rag_ready = state.chat.retriever().is_ready();
    Json(serde_json::json!({
        "ready": rag_ready,
        "components": {
            "rag_engine": rag_ready,
            "llm": !state.chat.generator_model().is_empty(),
        },
        "timestamp": jiff::Timestamp::now().to_string(),
    }))
}

async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "alive": true }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let length = request.message.chars().count();
    if request.message.trim().is_empty() || length > MAX_MESSAGE_CHARS {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("message must be between 1 and {MAX_MESSAGE_CHARS} characters"),
        ));
    }
    let session_id = request.session_id.clone();
    info!(
        session_id = session_id.as_deref().unwrap_or("anonymous"),
        message_length = length,
        "Chat request received"
    );

    let service = Arc::clone(&state.chat);
    let task = tokio::task::spawn_blocking(move || {
        service.respond(request.message.trim(), request.session_id.as_deref())
    });
    match tokio::time::timeout(state.handler_timeout, task).await {
        Ok(Ok(Ok(reply))) => Ok(Json(ChatResponse::from(reply))),
        Ok(Ok(Err(e))) => {
            error!(error = %format!("{e:#}"), session_id = ?session_id, "Chat error");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILURE_MESSAGE))
        }
        Ok(Err(join)) => {
            error!(error = %join, session_id = ?session_id, "Chat task failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILURE_MESSAGE))
        }
        Err(_) => {
            error!(timeout = ?state.handler_timeout, session_id = ?session_id, "Chat timed out");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILURE_MESSAGE))
        }
    }
}

async fn lead(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeadRequest>,
) -> Result<Json<LeadResponse>, ApiError> {
    info!(
        email = %redact_email(&request.email),
        session_id = ?request.session_id,
        "Lead capture request"
    );
    let submission = LeadSubmission {
        email: request.email,
        phone: request.phone,
        name: request.name,
        query_context: request.query_context,
        session_id: request.session_id,
    };

    let desk = Arc::clone(&state.leads);
    let task = tokio::task::spawn_blocking(move || desk.capture(submission));
    match tokio::time::timeout(state.handler_timeout, task).await {
        Ok(Ok(Ok(_))) => Ok(Json(LeadResponse {
            success: true,
            message: LEAD_ACCEPTED_MESSAGE.to_string(),
        })),
        Ok(Ok(Err(e))) => {
            error!(error = %format!("{e:#}"), "Lead could not be stored anywhere");
            Ok(Json(LeadResponse {
                success: false,
                message: LEAD_REJECTED_MESSAGE.to_string(),
            }))
        }
        Ok(Err(join)) => {
            error!(error = %join, "Lead task failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, LEAD_FAILURE_MESSAGE))
        }
        Err(_) => {
            error!(timeout = ?state.handler_timeout, "Lead capture timed out");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, LEAD_FAILURE_MESSAGE))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use dwight_lib::config::{GenerationConfig, RagConfig};
    use dwight_lib::embedding::EmbeddingProvider;
    use dwight_lib::generation::GenerationProvider;
    use dwight_lib::generation::prompts::PromptLibrary;
    use dwight_lib::index::CorpusIndex;
    use dwight_lib::lead::local::LocalFileSink;
    use dwight_lib::pipeline::ingest;
    use dwight_lib::pipeline::retrieve::Retriever;
    use dwight_lib::test_util::{FailingEmbedder, HashingEmbedder, StubGenerator};
    use dwight_test_util::corpus::sample_corpus;

    fn state_with(
        index: CorpusIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        dir: &Path,
    ) -> Arc<AppState> {
        let chat = ChatService::new(
            Retriever::new(Arc::new(index), embedder, 0.15),
            generator,
            PromptLibrary::new(dir.join("prompts")),
            GenerationConfig::default(),
            5,
        );
        Arc::new(AppState {
            chat: Arc::new(chat),
            leads: Arc::new(LeadDesk::new(LocalFileSink::new(dir.join("leads_backup.json")))),
            environment: "test".to_string(),
            handler_timeout: Duration::from_secs(10),
        })
    }

    fn corpus_state(dir: &Path, reply: &str) -> Arc<AppState> {
        let config = RagConfig {
            data_dir: dir.join("data"),
            index_dir: dir.join("index"),
            ..RagConfig::default()
        };
        sample_corpus(&config.data_dir);
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(256));
        let index = ingest::build_index(embedder.as_ref(), &config).unwrap();
        state_with(index, embedder, Arc::new(StubGenerator::new(reply)), dir)
    }

    fn chat_request(message: &str) -> Json<ChatRequest> {
        Json(ChatRequest {
            message: message.to_string(),
            session_id: Some("web-1".to_string()),
        })
    }

    #[tokio::test]
    async fn root_and_liveness() {
        assert_eq!(root().await.0["status"], "operational");
        assert_eq!(root().await.0["name"], APP_NAME);
        assert_eq!(live().await.0, serde_json::json!({ "alive": true }));
    }

    #[tokio::test]
    async fn health_reports_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let state = corpus_state(tmp.path(), "ok");
        let body = health(State(state)).await.0;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "test");
        assert_eq!(body["version"], APP_VERSION);
    }

    #[tokio::test]
    async fn readiness_follows_index() {
        let tmp = tempfile::tempdir().unwrap();
        let body = ready(State(corpus_state(tmp.path(), "ok"))).await.0;
        assert_eq!(body["ready"], true);
        assert_eq!(body["components"]["llm"], true);

        let empty = state_with(
            CorpusIndex::empty(8),
            Arc::new(HashingEmbedder::new(8)),
            Arc::new(StubGenerator::new("ok")),
            tmp.path(),
        );
        let body = ready(State(empty)).await.0;
        assert_eq!(body["ready"], false);
        assert_eq!(body["components"]["rag_engine"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chat_answers_with_intent_and_lead_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let state = corpus_state(tmp.path(), "Send origin and destination for a quote.");
        let Json(reply) = chat(State(state), chat_request("How much does shipping cost?"))
            .await
            .unwrap();
        assert_eq!(reply.response, "Send origin and destination for a quote.");
        assert_eq!(reply.intent, Intent::Sales);
        assert!(reply.lead_prompt);
        assert!(reply.timestamp.parse::<jiff::Timestamp>().is_ok());

        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["intent"], "sales");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chat_rejects_invalid_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let state = corpus_state(tmp.path(), "ok");

        let (status, _) = chat(State(Arc::clone(&state)), chat_request("   "))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let too_long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let (status, _) = chat(State(state), chat_request(&too_long))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chat_provider_failure_is_generic_500() {
        let tmp = tempfile::tempdir().unwrap();
        let index = CorpusIndex::from_parts(
            2,
            vec![vec![1.0, 0.0]],
            vec![dwight_lib::index::DocumentChunk {
                content: "Tracking help.".to_string(),
                source: "faq.md".to_string(),
                bucket: "1_customer_support".to_string(),
                intent: Intent::Support,
                chunk_index: 0,
            }],
        )
        .unwrap();
        let state = state_with(
            index,
            Arc::new(FailingEmbedder { dimension: 2 }),
            Arc::new(StubGenerator::new("unused")),
            tmp.path(),
        );
        let (status, Json(body)) = chat(State(state), chat_request("Where is my container?"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.detail, CHAT_FAILURE_MESSAGE);
        assert!(!body.detail.contains("embedding"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lead_falls_back_to_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let state = corpus_state(tmp.path(), "ok");
        let request = LeadRequest {
            email: "jane@example.com".to_string(),
            phone: "+1 555 0100".to_string(),
            name: None,
            query_context: Some("Quote for 2 FCL".to_string()),
            session_id: Some("web-1".to_string()),
        };

        let Json(body) = lead(State(state), Json(request)).await.unwrap();
        assert!(body.success);
        assert_eq!(body.message, LEAD_ACCEPTED_MESSAGE);

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join("leads_backup.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved[0]["email"], "jane@example.com");
        assert_eq!(saved[0]["query_context"], "Quote for 2 FCL");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lead_reports_failure_when_nothing_stores_it() {
        let tmp = tempfile::tempdir().unwrap();
        let base = corpus_state(tmp.path(), "ok");
        // The backup path is a directory, so even the fallback fails.
        let state = Arc::new(AppState {
            chat: Arc::clone(&base.chat),
            leads: Arc::new(LeadDesk::new(LocalFileSink::new(tmp.path()))),
            environment: "test".to_string(),
            handler_timeout: Duration::from_secs(10),
        });
        let request = LeadRequest {
            email: "x@y.z".to_string(),
            phone: "1".to_string(),
            name: None,
            query_context: None,
            session_id: None,
        };
        let Json(body) = lead(State(state), Json(request)).await.unwrap();
        assert!(!body.success);
        assert_eq!(body.message, LEAD_REJECTED_MESSAGE);
    }

    #[test]
    fn router_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let _router = router(corpus_state(tmp.path(), "ok"));
    }
}

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::GenerationConfig;
use crate::generation::GenerationProvider;
use crate::generation::prompts::PromptLibrary;
use crate::pipeline::guardrails::{check_response_quality, sanitize_input, validate};
use crate::pipeline::intent::{Intent, classify};
use crate::pipeline::lead_trigger::should_prompt_lead;
use crate::pipeline::retrieve::Retriever;

/// Sent in place of an answer when the generation backend fails.
pub const GENERATION_FAILURE_RESPONSE: &str = "I'm having trouble processing your request right now. Please try again or ask to be connected with our team.";

/// Session label used in logs when the client sent none.
const ANONYMOUS_SESSION: &str = "anonymous";

/// One answered chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub intent: Intent,
    /// Whether the client should ask the user for contact details.
    pub lead_prompt: bool,
    pub timestamp: jiff::Timestamp,
}

/// The online pipeline: sanitize, classify, retrieve, generate, validate.
///
/// Built once at startup and shared by every request.
pub struct ChatService {
    retriever: Retriever,
    generator: Arc<dyn GenerationProvider>,
    prompts: PromptLibrary,
    generation: GenerationConfig,
    top_k: usize,
}

impl ChatService {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn GenerationProvider>,
        prompts: PromptLibrary,
        generation: GenerationConfig,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            prompts,
            generation,
            top_k,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator_model(&self) -> &str {
        self.generator.model()
    }

    /// Answer `message`.
    ///
    /// Retrieval failures are returned as errors. A generation failure is
    /// logged and answered with [`GENERATION_FAILURE_RESPONSE`].
    pub fn respond(&self, message: &str, session_id: Option<&str>) -> anyhow::Result<ChatReply> {
        let started = Instant::now();
        let session_id = session_id.unwrap_or(ANONYMOUS_SESSION);
        let message = message.trim();
        let query = sanitize_input(message);

        let intent = classify(&query);
        let context = self.retriever.retrieve(&query, intent, self.top_k)?;

        let system_prompt = self.prompts.render(intent, &context, &query);
        let raw = match self.generator.complete(
            &system_prompt,
            &query,
            self.generation.temperature,
            self.generation.max_tokens,
        ) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %format!("{e:#}"), session_id, "Generation failed");
                GENERATION_FAILURE_RESPONSE.to_string()
            }
        };

        let response = validate(&raw, &context);
        let verdict = check_response_quality(&response, &query);
        if !verdict.is_acceptable() {
            warn!(reason = verdict.reason(), session_id, "Low quality response");
        }
        // Buying signals are judged on what the user actually wrote.
        let lead_prompt = should_prompt_lead(message, intent);

        info!(
            session_id,
            message_length = query.chars().count(),
            response_length = response.chars().count(),
            %intent,
            context_length = context.chars().count(),
            lead_prompt,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "chat_interaction"
        );

        Ok(ChatReply {
            response,
            intent,
            lead_prompt,
            timestamp: jiff::Timestamp::now(),
        })
    }
}

pub mod openai;
pub mod prompts;

/// Trait implemented by chat-completion backends.
pub trait GenerationProvider: Send + Sync {
    /// Produce a reply to `user_query` under `system_prompt`.
    fn complete(
        &self,
        system_prompt: &str,
        user_query: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> anyhow::Result<String>;

    /// Model identifier, for logs and readiness reporting.
    fn model(&self) -> &str;
}

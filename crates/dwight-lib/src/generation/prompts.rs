use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::pipeline::intent::Intent;

/// Substituted for `{context}` when retrieval found nothing.
pub const NO_CONTEXT_PLACEHOLDER: &str = "[No relevant context found in knowledge base]";

/// Used when an intent's template file is absent or unreadable.
pub const DEFAULT_TEMPLATE: &str = "You are a helpful assistant for an international freight forwarding company.

CORE RULES:
1. Answer ONLY using the provided context below
2. If the answer is not in the context, say: \"I don't have confirmed information on that at the moment. I can connect you with our team if you'd like.\"
3. Never guess or make up information
4. Be concise, professional, and helpful

CONTEXT WILL BE PROVIDED BELOW:
---
{context}
---

USER QUERY:
{query}

Provide a helpful, accurate response based strictly on the context above.";

/// Per-intent system prompt templates loaded lazily from a directory.
///
/// Templates are read once and cached by file name. Two threads racing on
/// first access both insert the same file contents.
pub struct PromptLibrary {
    dir: PathBuf,
    cache: RwLock<HashMap<&'static str, Arc<str>>>,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Raw template for `intent`, falling back to [`DEFAULT_TEMPLATE`].
    pub fn template(&self, intent: Intent) -> Arc<str> {
        let name = intent.prompt_template();
        if let Some(cached) = self.cache.read().ok().and_then(|c| c.get(name).cloned()) {
            return cached;
        }

        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(file = %path.display(), "Loaded prompt template");
                let template: Arc<str> = Arc::from(content);
                if let Ok(mut cache) = self.cache.write() {
                    cache.insert(name, Arc::clone(&template));
                }
                template
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Prompt template not found, using default");
                Arc::from(DEFAULT_TEMPLATE)
            }
        }
    }

    /// System prompt for `intent` with `{context}` and `{query}` filled in.
    pub fn render(&self, intent: Intent, context: &str, query: &str) -> String {
        let context = if context.trim().is_empty() {
            NO_CONTEXT_PLACEHOLDER
        } else {
            context
        };
        fill(&self.template(intent), context, query)
    }
}

const CONTEXT_SLOT: &str = "{context}";
const QUERY_SLOT: &str = "{query}";

/// Substitute both slots in a single left-to-right pass, so placeholder
/// text inside retrieved context or the query is never expanded.
fn fill(template: &str, context: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUERY_SLOT) {
            out.push_str(query);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

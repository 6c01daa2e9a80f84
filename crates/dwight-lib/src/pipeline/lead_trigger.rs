use tracing::debug;

use crate::pipeline::intent::Intent;

/// Phrases that mark a message as a buying signal regardless of intent.
pub const LEAD_TRIGGERS: &[&str] = &[
    "quote",
    "quotation",
    "pricing",
    "price",
    "cost",
    "get started",
    "how do i start",
    "become a customer",
    "sign up",
    "onboard",
    "contact",
    "speak to someone",
    "interested in",
    "want to ship",
    "need shipping",
];

/// Whether the reply to `message` should invite the user to leave contact
/// details. Sales intent always does.
pub fn should_prompt_lead(message: &str, intent: Intent) -> bool {
    if intent == Intent::Sales {
        return true;
    }
    let lower = message.to_lowercase();
    match LEAD_TRIGGERS.iter().find(|t| lower.contains(*t)) {
        Some(trigger) => {
            debug!(trigger, "Lead trigger detected");
            true
        }
        None => false,
    }
}

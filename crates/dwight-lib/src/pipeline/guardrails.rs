//! Post-generation response policy and pre-classification input hygiene.
//!
//! Nothing in here fails: malformed or hostile text degrades to the fixed
//! refusal (responses) or to a filtered string (input).

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::config::MAX_MESSAGE_CHARS;

/// Returned whenever a response cannot be backed by retrieved context.
pub const REFUSAL_RESPONSE: &str = "I don't have confirmed information on that at the moment. I can connect you with our team if you'd like.";

/// Hedging and self-referential phrases stripped from every response.
pub const DENY_LIST: &[&str] = &[
    "i'm just a bot",
    "i'm just an ai",
    "as an ai",
    "as a language model",
    "i cannot access",
    "i don't have access to real-time",
    "i'm not sure, but",
    "based on my training",
    "based on my knowledge",
    "i think",
    "i believe",
    "probably",
    "maybe",
    "let me guess",
];

/// Phrases that signal general-knowledge speculation.
pub const SPECULATION_PHRASES: &[&str] = &[
    "typically in the industry",
    "generally speaking",
    "in most cases",
    "usually companies",
    "standard practice is",
];

/// Anchored on word boundaries so ordinary words ("contact as",
/// "impact assessment") are left alone.
const INJECTION_PATTERNS: &[&str] = &[
    r"\bignore (?:all |previous |above )?instructions\b",
    r"\bforget (?:all |previous |above )?instructions\b",
    r"\bnew instructions:",
    r"\bsystem prompt:",
    r"\byou are now\b",
    r"\bact as\b",
    r"\bpretend to be\b",
];

const FILTERED: &str = "[FILTERED]";

/// Minimum response length (characters) considered a real answer.
const MIN_RESPONSE_CHARS: usize = 10;
/// Queries shorter than this may legitimately be answered with the refusal.
const SHORT_QUERY_CHARS: usize = 20;
/// Repetition is only judged for responses longer than this many words.
const REPETITION_MIN_WORDS: usize = 10;
const MIN_UNIQUE_WORD_RATIO: f64 = 0.3;

static DENY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DENY_LIST
        .iter()
        .filter_map(|phrase| Regex::new(&format!("(?i){}", regex::escape(phrase))).ok())
        .collect()
});

static APOLOGY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)i('m| am) (so |very )?sorry,? (but |that )?").ok());

static INJECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    INJECTION_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
});

/// Clean a generated response against the context it was generated from.
///
/// Deny-listed phrases are removed. When `context_used` is blank, a response
/// that speculates or hedged at all is replaced by [`REFUSAL_RESPONSE`].
/// Leading apologies are stripped, and a response left empty becomes the
/// refusal.
pub fn validate(generated_text: &str, context_used: &str) -> String {
    let mut hedged = false;
    let mut cleaned = generated_text.to_string();
    for (phrase, pattern) in DENY_LIST.iter().zip(DENY_PATTERNS.iter()) {
        if pattern.is_match(&cleaned) {
            warn!(phrase, "Deny-listed phrase removed from response");
            hedged = true;
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
    }

    if context_used.trim().is_empty() {
        let lower = cleaned.to_lowercase();
        if let Some(phrase) = SPECULATION_PHRASES.iter().find(|p| lower.contains(*p)) {
            warn!(phrase, "Speculation without supporting context");
            return REFUSAL_RESPONSE.to_string();
        }
        if hedged {
            warn!("Hedged response without supporting context");
            return REFUSAL_RESPONSE.to_string();
        }
    }

    if let Some(apology) = APOLOGY.as_ref() {
        cleaned = apology.replace_all(&cleaned, "").into_owned();
    }

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return REFUSAL_RESPONSE.to_string();
    }
    trimmed.to_string()
}

/// Neutralize prompt-injection phrasing, cap the length, and trim.
pub fn sanitize_input(text: &str) -> String {
    let mut sanitized = text.to_string();
    for pattern in INJECTIONS.iter() {
        if pattern.is_match(&sanitized) {
            warn!(pattern = pattern.as_str(), "Potential injection attempt filtered");
            sanitized = pattern.replace_all(&sanitized, FILTERED).into_owned();
        }
    }
    if let Some((cut, _)) = sanitized.char_indices().nth(MAX_MESSAGE_CHARS) {
        sanitized.truncate(cut);
    }
    sanitized.trim().to_string()
}

/// Outcome of [`check_response_quality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    Acceptable,
    TooShort,
    Repetitive,
}

impl QualityVerdict {
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Self::Acceptable)
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Self::Acceptable => "OK",
            Self::TooShort => "Response too short",
            Self::Repetitive => "Excessive repetition detected",
        }
    }
}

/// Advisory quality check on a final response. Never blocks delivery.
pub fn check_response_quality(response: &str, query: &str) -> QualityVerdict {
    if response.chars().count() < MIN_RESPONSE_CHARS {
        return QualityVerdict::TooShort;
    }
    if response == REFUSAL_RESPONSE && query.chars().count() < SHORT_QUERY_CHARS {
        return QualityVerdict::Acceptable;
    }

    let words: Vec<String> = response
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if words.len() > REPETITION_MIN_WORDS {
        let unique = words
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len();
        #[allow(clippy::cast_precision_loss)]
        let ratio = unique as f64 / words.len() as f64;
        if ratio < MIN_UNIQUE_WORD_RATIO {
            return QualityVerdict::Repetitive;
        }
    }
    QualityVerdict::Acceptable
}

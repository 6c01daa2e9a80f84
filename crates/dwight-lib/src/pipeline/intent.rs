use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coarse category of a user request.
///
/// Controls which system prompt is used and which corpus bucket is favored
/// during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Customer support queries. Fallback when nothing else matches.
    #[default]
    Support,
    /// Pricing, quotes and onboarding queries.
    Sales,
    /// Internal policy and procedure queries.
    Internal,
}

impl Intent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Sales => "sales",
            Self::Internal => "internal",
        }
    }

    /// File name of the system prompt template for this intent.
    pub const fn prompt_template(self) -> &'static str {
        match self {
            Self::Support => "system_support.txt",
            Self::Sales => "system_sales.txt",
            Self::Internal => "system_internal.txt",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword density above which a category is selected.
///
/// Sensitive to list length: with 29 sales keywords a single hit (0.034)
/// is not enough, while a single internal hit (1/18 = 0.056) is.
pub const KEYWORD_DENSITY_THRESHOLD: f64 = 0.05;

const SALES_KEYWORDS: &[&str] = &[
    "price",
    "pricing",
    "cost",
    "quote",
    "quotation",
    "rate",
    "rates",
    "how much",
    "charges",
    "fee",
    "fees",
    "budget",
    "get started",
    "become a customer",
    "onboard",
    "onboarding",
    "sign up",
    "signup",
    "register",
    "contract",
    "agreement",
    "payment terms",
    "credit",
    "partner",
    "partnership",
    "interested in",
    "want to use",
    "looking for",
    "need shipping",
];

const INTERNAL_KEYWORDS: &[&str] = &[
    "policy",
    "policies",
    "procedure",
    "procedures",
    "protocol",
    "escalation",
    "escalate",
    "sla",
    "kpi",
    "standard",
    "internal",
    "employee",
    "staff",
    "team",
    "department",
    "quality standard",
    "compliance",
    "audit",
];

static SALES_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_patterns(&[
        r"how (?:much|do i|can i|to) (?:pay|start|begin|sign)",
        r"(?:can you|could you) (?:give|send|provide) (?:me )?(?:a )?quote",
        r"what (?:are|is) (?:the|your) (?:price|cost|rate|charge)",
        r"i (?:want|need|am looking) to (?:ship|send|export|import)",
        r"(?:pricing|quote|cost) for",
    ])
});

static INTERNAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_patterns(&[
        r"what is (?:the|our) (?:policy|procedure|protocol)",
        r"how (?:do|should) (?:we|i|staff) (?:handle|process|escalate)",
        r"(?:internal|staff|employee) (?:guide|guideline|policy)",
    ])
});

/// Patterns are compile-time constants; one that fails to compile is
/// dropped rather than taking the classifier down.
fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

/// Classify a user message into an [`Intent`].
///
/// Rules applied in order:
/// 1. Sales: any sales pattern matches, or sales keyword density > 0.05
/// 2. Internal: same test against the internal lists
/// 3. Otherwise `Support`
pub fn classify(message: &str) -> Intent {
    let lowered = message.to_lowercase();

    let sales_density = keyword_density(&lowered, SALES_KEYWORDS);
    if matches_any(&lowered, &SALES_PATTERNS) || sales_density > KEYWORD_DENSITY_THRESHOLD {
        debug!(density = sales_density, "Classified as sales");
        return Intent::Sales;
    }

    let internal_density = keyword_density(&lowered, INTERNAL_KEYWORDS);
    if matches_any(&lowered, &INTERNAL_PATTERNS) || internal_density > KEYWORD_DENSITY_THRESHOLD
    {
        debug!(density = internal_density, "Classified as internal");
        return Intent::Internal;
    }

    debug!("Classified as support (default)");
    Intent::Support
}

/// Fraction of `keywords` occurring as substrings of the lowercased text.
#[allow(clippy::cast_precision_loss)]
fn keyword_density(lowered: &str, keywords: &[&str]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let hits = keywords.iter().filter(|kw| lowered.contains(*kw)).count();
    hits as f64 / keywords.len() as f64
}

fn matches_any(lowered: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(lowered))
}

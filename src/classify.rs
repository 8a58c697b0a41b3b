//! Transient vs permanent error classification.
//!
//! Failure domains differ between the writer pool (disk / file-descriptor
//! centric) and the upload queue (network centric), so each keeps its own
//! prioritized table of match rules. Rules are matched in order; the first
//! match wins. A message that matches nothing, or an empty message, is
//! permanent: retrying something we cannot recognize as infrastructure noise
//! cannot succeed.

use regex::Regex;
use std::sync::LazyLock;

/// Outcome of classifying a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Infrastructure or timing issue; worth retrying with backoff.
    Transient,
    /// Authorization, schema, or configuration issue; retrying cannot succeed.
    Permanent,
}

impl ErrorClass {
    /// Whether a failure of this class should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// A single prioritized classification rule.
struct MatchRule {
    pattern: Regex,
    class: ErrorClass,
}

impl MatchRule {
    fn new(pattern: &str, class: ErrorClass) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("classification pattern should compile"),
            class,
        }
    }
}

/// Writer pool rules: disk-full, file-descriptor exhaustion, resource
/// contention, timeouts, and worker crash signals are all transient.
static WRITER_POOL_RULES: LazyLock<Vec<MatchRule>> = LazyLock::new(|| {
    use ErrorClass::Transient;
    vec![
        MatchRule::new(r"(?i)no space left|disk full|enospc", Transient),
        MatchRule::new(r"(?i)too many open files|emfile|enfile", Transient),
        MatchRule::new(
            r"(?i)resource (temporarily )?(busy|unavailable)|eagain|ebusy",
            Transient,
        ),
        MatchRule::new(r"(?i)timed? ?out", Transient),
        MatchRule::new(r"(?i)worker (crashed|panicked)|killed by signal", Transient),
    ]
});

/// Upload rules: permanent authorization/addressing failures are listed first
/// so "403 after retries timed out" style messages do not get retried forever.
static UPLOAD_RULES: LazyLock<Vec<MatchRule>> = LazyLock::new(|| {
    use ErrorClass::{Permanent, Transient};
    vec![
        MatchRule::new(r"(?i)\b(403|404)\b|forbidden|not found", Permanent),
        MatchRule::new(r"(?i)access denied", Permanent),
        MatchRule::new(r"(?i)(no such|invalid) (bucket|key)", Permanent),
        MatchRule::new(r"(?i)signature ?(mismatch|does ?not ?match)", Permanent),
        MatchRule::new(r"(?i)connection (reset|refused|closed|aborted)", Transient),
        MatchRule::new(r"(?i)timed? ?out", Transient),
        MatchRule::new(
            r"(?i)name resolution|dns|getaddrinfo|no address associated",
            Transient,
        ),
        MatchRule::new(r"(?i)\b5\d\d\b|internal server error|service unavailable|bad gateway", Transient),
        MatchRule::new(r"(?i)\b429\b|rate limit|too many requests|slow ?down", Transient),
        MatchRule::new(r"(?i)socket hang ?up|broken pipe", Transient),
    ]
});

fn classify(rules: &[MatchRule], message: &str) -> ErrorClass {
    if message.trim().is_empty() {
        return ErrorClass::Permanent;
    }
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(message))
        .map(|rule| rule.class)
        .unwrap_or(ErrorClass::Permanent)
}

/// Classify a writer pool job failure message.
pub fn classify_job_error(message: &str) -> ErrorClass {
    classify(&WRITER_POOL_RULES, message)
}

/// Classify an upload transfer failure message.
pub fn classify_upload_error(message: &str) -> ErrorClass {
    classify(&UPLOAD_RULES, message)
}

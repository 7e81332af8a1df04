//! PII redaction — replace sensitive substrings with category placeholders.
//!
//! A fixed, ordered set of pattern categories is applied to text before it
//! is sent to any provider and to generated suggestions before they are
//! cached or returned.  Redaction is irreversible by design: the original
//! substring is discarded, only the category token survives.
//!
//! Category order matters and is part of the contract — earlier passes can
//! consume text a later pass would otherwise match.  The two-capitalized-words
//! `[NAME]` heuristic is intentionally broad and will match phrases that are
//! not names; that trade-off favors over-redaction.

use once_cell::sync::Lazy;
use regex::Regex;

// ---------------------------------------------------------------------------
// Patterns (applied in declaration order)
// ---------------------------------------------------------------------------

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").unwrap());

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b").unwrap()
});

/// Two consecutive capitalized words.  Broad on purpose.
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").unwrap());

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+\s+(?:[A-Za-z]+\s+)*?(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way)\b\.?")
        .unwrap()
});

static STATE_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}\s+\d{5}(?:-\d{4})?\b").unwrap());

static PASSWORD_KV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:password|passwd|pwd)\s*[:=]\s*\S+").unwrap()
});

static CREDENTIAL_KV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:token|secret|api[-_ ]?key|credential)s?\s*[:=]\s*\S+").unwrap()
});

// ---------------------------------------------------------------------------
// redact_pii
// ---------------------------------------------------------------------------

/// Apply every redaction category, in order, returning the sanitized text.
///
/// # Example
/// ```rust
/// use copilot_core::security::redact_pii;
///
/// let out = redact_pii("Contact me at a@b.com or 555-123-4567");
/// assert!(out.contains("[EMAIL]"));
/// assert!(out.contains("[PHONE]"));
/// ```
pub fn redact_pii(text: &str) -> String {
    let passes: [(&Regex, &str); 9] = [
        (&EMAIL, "[EMAIL]"),
        (&SSN, "[SSN]"),
        (&CARD, "[CARD]"),
        (&PHONE, "[PHONE]"),
        (&NAME, "[NAME]"),
        (&ADDRESS, "[ADDRESS]"),
        (&STATE_ZIP, "[ZIP]"),
        (&PASSWORD_KV, "[PASSWORD]"),
        (&CREDENTIAL_KV, "[CREDENTIAL]"),
    ];

    let mut out = text.to_string();
    for (pattern, placeholder) in passes {
        out = pattern.replace_all(&out, placeholder).into_owned();
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Individual categories --------------------------------------------

    #[test]
    fn redacts_email_and_phone() {
        let out = redact_pii("Contact me at a@b.com or 555-123-4567");
        assert!(out.contains("[EMAIL]"), "out: {out}");
        assert!(out.contains("[PHONE]"), "out: {out}");
        assert!(!out.contains("a@b.com"));
        assert!(!out.contains("555-123-4567"));
    }

    #[test]
    fn redacts_ssn() {
        let out = redact_pii("my ssn is 123-45-6789 ok");
        assert_eq!(out, "my ssn is [SSN] ok");
    }

    #[test]
    fn redacts_card_number_with_and_without_separators() {
        assert!(redact_pii("card 4111 1111 1111 1111 thanks").contains("[CARD]"));
        assert!(redact_pii("card 4111-1111-1111-1111 thanks").contains("[CARD]"));
        assert!(redact_pii("card 4111111111111111 thanks").contains("[CARD]"));
    }

    #[test]
    fn redacts_capitalized_name_pair() {
        let out = redact_pii("the interviewer was jane and Alice Johnson joined late");
        assert!(out.contains("[NAME]"), "out: {out}");
        assert!(!out.contains("Alice Johnson"));
    }

    /// The heuristic is documented as over-broad: any two capitalized words
    /// match, names or not.
    #[test]
    fn name_heuristic_is_intentionally_broad() {
        let out = redact_pii("The Quick Brown fox");
        assert!(out.contains("[NAME]"), "out: {out}");
    }

    #[test]
    fn redacts_street_address() {
        let out = redact_pii("i live at 42 elm Street near the park");
        assert!(out.contains("[ADDRESS]"), "out: {out}");
    }

    #[test]
    fn redacts_state_zip() {
        let out = redact_pii("ship to Portland, OR 97201 please");
        assert!(out.contains("[ZIP]"), "out: {out}");
        assert!(!out.contains("97201"));
    }

    #[test]
    fn redacts_password_and_credential_pairs() {
        let out = redact_pii("password: hunter2 and api_key=sk-123456");
        assert!(out.contains("[PASSWORD]"), "out: {out}");
        assert!(out.contains("[CREDENTIAL]"), "out: {out}");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("sk-123456"));
    }

    // ---- Order & idempotence ----------------------------------------------

    #[test]
    fn clean_text_passes_through_unchanged() {
        let text = "let's review the quarterly numbers together";
        assert_eq!(redact_pii(text), text);
    }

    #[test]
    fn redaction_is_idempotent() {
        let once = redact_pii("mail a@b.com, call 555-123-4567, meet Alice Johnson");
        let twice = redact_pii(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn multiple_occurrences_all_replaced() {
        let out = redact_pii("a@b.com c@d.org e@f.net");
        assert_eq!(out, "[EMAIL] [EMAIL] [EMAIL]");
    }
}

//! Adversarial-input defenses shared by the suggestion engine and the
//! transcription session.
//!
//! * [`redact`] — irreversible PII redaction (category placeholders).
//! * [`screen`] — prompt-injection phrase and command-token screening.

pub mod redact;
pub mod screen;

pub use redact::redact_pii;
pub use screen::{screen_text, InjectionHit};

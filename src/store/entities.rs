//! Persisted entity types.
//!
//! Every struct here is serialized to JSON and sealed by the store's cipher
//! before it touches disk, so the field values below never exist unencrypted
//! at rest.  All structs implement `Serialize`, `Deserialize` and `Clone` so
//! they round-trip through the sealed-record codec and can be handed to
//! callers by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionKind
// ---------------------------------------------------------------------------

/// What kind of conversation a session captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// A job interview the user is taking part in.
    Interview,
    /// A work meeting.
    Meeting,
    /// Free-form chat.
    Chat,
}

impl SessionKind {
    /// Stable lowercase tag, matching the serde representation.
    pub fn tag(&self) -> &'static str {
        match self {
            SessionKind::Interview => "interview",
            SessionKind::Meeting => "meeting",
            SessionKind::Chat => "chat",
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interview" => Ok(SessionKind::Interview),
            "meeting" => Ok(SessionKind::Meeting),
            "chat" => Ok(SessionKind::Chat),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One recorded conversation session.
///
/// Created on start, mutated once (`ended_at`) on stop, and removed only by
/// a full wipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub kind: SessionKind,
    /// Free-form mode label (e.g. `"live"`, `"replay"`).
    pub mode: String,
    pub title: Option<String>,
    /// Label of the application the audio came from, when known.
    pub source_app: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Arbitrary caller-supplied metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Options for creating a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub kind: SessionKind,
    pub mode: String,
    pub title: Option<String>,
    pub source_app: Option<String>,
}

impl SessionOptions {
    /// Session options with just a kind; mode defaults to `"live"`.
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            mode: "live".into(),
            title: None,
            source_app: None,
        }
    }
}

/// Fields that [`update_session`](crate::store::SecureStore::update_session)
/// may change.  `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// TranscriptSegment
// ---------------------------------------------------------------------------

/// One accepted chunk of transcribed speech.  Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub speaker: String,
    /// Transcript text, already PII-redacted before persistence.
    pub text: String,
    /// Transcriber confidence in `[0, 1]`.
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// Suggestion
// ---------------------------------------------------------------------------

/// One generated coaching suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    /// `Some` for persisted suggestions; `None` only for transient fallback
    /// batches that never hit the store.
    pub session_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    /// Pipeline tag the suggestion was generated through.
    pub pipeline: String,
    pub content: String,
    /// Set when the user acts on the suggestion.
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// ActionItem
// ---------------------------------------------------------------------------

/// A follow-up extracted from a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub owner: String,
    pub text: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The user's singleton profile.  Overwritten wholesale on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Résumé text.
    pub resume: String,
    /// Target job description text.
    pub job_description: String,
    pub role: String,
    pub industry: String,
    #[serde(default)]
    pub preferences: serde_json::Value,
}

// ---------------------------------------------------------------------------
// IntegrationCredential
// ---------------------------------------------------------------------------

/// OAuth-style credentials for an external integration, keyed by provider
/// name.  Upserted wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationCredential {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Per-session speaking metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub session_id: Uuid,
    /// Clarity score in `[0, 1]`.
    pub clarity: f32,
    pub words_per_minute: f32,
    /// Fraction of filler words.
    pub filler_rate: f32,
    /// Fraction of the conversation where the user was speaking.
    pub talk_ratio: f32,
    pub interruptions: u32,
}

// ---------------------------------------------------------------------------
// ContextCacheEntry
// ---------------------------------------------------------------------------

/// One TTL-bounded context-cache row.  A read past `expires_at` behaves as a
/// miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_kind_tag_round_trips_with_from_str() {
        for kind in [SessionKind::Interview, SessionKind::Meeting, SessionKind::Chat] {
            assert_eq!(kind.tag().parse::<SessionKind>(), Ok(kind));
        }
        assert!("standup".parse::<SessionKind>().is_err());
    }

    #[test]
    fn session_kind_serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&SessionKind::Interview).expect("serialize");
        assert_eq!(json, "\"interview\"");
    }

    #[test]
    fn session_json_round_trip() {
        let session = Session {
            id: Uuid::new_v4(),
            kind: SessionKind::Meeting,
            mode: "live".into(),
            title: Some("standup".into()),
            source_app: None,
            started_at: Utc::now(),
            ended_at: None,
            metadata: serde_json::json!({"room": "4b"}),
        };
        let bytes = serde_json::to_vec(&session).expect("serialize");
        let back: Session = serde_json::from_slice(&bytes).expect("deserialize");
        assert_eq!(back.id, session.id);
        assert_eq!(back.kind, session.kind);
        assert_eq!(back.metadata, session.metadata);
    }

    #[test]
    fn session_options_default_mode_is_live() {
        let opts = SessionOptions::new(SessionKind::Chat);
        assert_eq!(opts.mode, "live");
        assert!(opts.title.is_none());
    }
}

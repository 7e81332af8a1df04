//! Secure session store and resilient AI orchestration core.
//!
//! This crate is the headless core of a conversation copilot: it persists
//! session data under authenticated encryption with OS-backed key
//! management, and orchestrates calls to interchangeable text-generation
//! and speech-transcription backends with caching, rate limiting, retries,
//! fallback chains, and adversarial-input defenses.  Window management,
//! hotkeys, audio capture, and packaging live in the embedding application.
//!
//! # Modules
//!
//! * [`store`] — [`store::SecureStore`]: encrypted entity persistence,
//!   key lifecycle, atomic wipe, ephemeral degradation.
//! * [`engine`] — [`engine::SuggestionEngine`]: pipelines, providers,
//!   retry/fallback, rate limiting, caching, response validation.
//! * [`transcription`] — [`transcription::TranscriptionSession`]:
//!   buffering, confidence gating, circuit breaking, retention cleanup.
//! * [`security`] — PII redaction and prompt-injection screening.
//! * [`events`] — typed event bus with droppable subscription handles.
//! * [`config`] — TOML settings and platform paths.
//! * `core` — [`SessionCore`]: the command facade the orchestrating
//!   application calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use copilot_core::config::CoreConfig;
//! use copilot_core::core::{GetSuggestionsOptions, SessionCore};
//! use copilot_core::store::entities::{SessionKind, SessionOptions};
//! use copilot_core::transcription::{AlwaysAvailable, UnavailableTranscriber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CoreConfig::load().unwrap_or_default();
//!
//!     // Backends are injected; swap in real ones from the host app.
//!     let transcriber = Arc::new(UnavailableTranscriber::new("no backend configured"));
//!     let gate = Arc::new(AlwaysAvailable);
//!
//!     let mut core = SessionCore::open(config, transcriber, gate).expect("open core");
//!     let mut events = core.subscribe();
//!
//!     let session = core
//!         .start_session(SessionOptions::new(SessionKind::Meeting))
//!         .await
//!         .expect("start session");
//!
//!     let suggestions = core
//!         .get_suggestions(
//!             "we agreed to ship the beta next week",
//!             GetSuggestionsOptions {
//!                 pipeline: "meeting".into(),
//!                 session_id: Some(session.id),
//!             },
//!         )
//!         .await;
//!     println!("{} suggestions", suggestions.len());
//!
//!     let summary = core.stop_session().await.expect("stop session");
//!     println!("summary for {}: {:?}", summary.session_id, summary.summary);
//!     drop(events);
//! }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod events;
pub mod security;
pub mod store;
pub mod transcription;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use crate::core::{CoreError, GetSuggestionsOptions, SessionCore, SessionSummary};
pub use config::{AppPaths, CoreConfig, ModelSize};
pub use engine::pipeline::Pipeline;
pub use engine::{
    ApiProvider, EngineConfig, ProviderError, ProviderSettings, SuggestionBatch, SuggestionEngine,
};
pub use events::{CoreEvent, EventBus, EventSubscription};
pub use store::entities::{
    ActionItem, ContextCacheEntry, IntegrationCredential, Metric, Profile, Session, SessionKind,
    SessionOptions, Suggestion, TranscriptSegment,
};
pub use store::{KeyBackend, SecureStore, StoreError};
pub use transcription::{
    CaptureGate, SessionState, Transcriber, TranscriptionConfig, TranscriptionSession,
};

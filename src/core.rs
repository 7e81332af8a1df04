//! Session core — the command surface the orchestrating application calls.
//!
//! [`SessionCore`] composes the secure store, the suggestion engine, and
//! per-session transcription behind the external command set:
//! `start_session`, `stop_session`, `get_suggestions`,
//! `partial_transcript`, `save_profile`/`profile`, and `wipe_all_data`.
//!
//! Every dependency (store, providers, transcriber, capture gate) is
//! injected at construction — there are no module-level singletons and no
//! import-time side effects.
//!
//! # Session driving
//!
//! `start_session` spawns one driver task per session.  The task owns the
//! [`TranscriptionSession`] and serializes everything that touches it:
//! audio and stop commands arrive over an mpsc channel, and a fixed
//! interval triggers processing passes.  Because one task awaits each pass
//! before selecting again, passes are strictly sequential and transcripts
//! are emitted in order.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::{AppPaths, CoreConfig, ProvidersSettings, TranscriptionSettings};
use crate::engine::pipeline::Pipeline;
use crate::engine::provider::{GenerateOptions, Provider, RetryPolicy};
use crate::engine::{ApiProvider, EngineConfig, SuggestionEngine};
use crate::events::{CoreEvent, EventBus, EventSubscription};
use crate::store::entities::{
    Profile, Session, SessionKind, SessionOptions, SessionPatch, Suggestion,
};
use crate::store::keys::KeyProvider;
use crate::store::{SecureStore, StoreError};
use crate::transcription::maintenance::{spawn_maintenance_task, MaintenanceConfig};
use crate::transcription::{CaptureGate, Transcriber, TranscriptionConfig, TranscriptionSession};

// ---------------------------------------------------------------------------
// CoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by the command facade.
///
/// Suggestion generation never appears here — it always resolves to a
/// usable batch.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `stop_session` was called with no session running.
    #[error("no active session")]
    NoActiveSession,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Command surface types
// ---------------------------------------------------------------------------

/// Result of [`SessionCore::stop_session`].
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Summary suggestion batch generated from the accumulated transcript.
    pub summary: Vec<String>,
}

/// Options for [`SessionCore::get_suggestions`].
#[derive(Debug, Clone)]
pub struct GetSuggestionsOptions {
    /// Pipeline tag (`"interview"`, `"meeting"`, `"issue-tracker"`,
    /// `"documentation"`, `"chat"`).
    pub pipeline: String,
    /// Session to enrich from and persist under, when known.
    pub session_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Session driver plumbing
// ---------------------------------------------------------------------------

enum SessionCommand {
    Audio(Vec<f32>),
    Stop { ack: oneshot::Sender<()> },
}

struct SessionDriver {
    cmd_tx: mpsc::Sender<SessionCommand>,
    task: tokio::task::JoinHandle<()>,
}

struct ActiveSession {
    session_id: Uuid,
    kind: SessionKind,
    /// `None` when transcription landed in `Disabled` — the session row
    /// still exists and can be stopped normally.
    driver: Option<SessionDriver>,
}

/// Owns the transcription session; the only place that touches it.
async fn drive_session(
    mut session: TranscriptionSession,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Consume the immediate first tick so the first pass happens one full
    // interval after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::Audio(samples)) => session.push_audio(&samples),
                Some(SessionCommand::Stop { ack }) => {
                    session.stop();
                    let _ = ack.send(());
                    break;
                }
                None => {
                    session.stop();
                    break;
                }
            },
            _ = ticker.tick() => {
                session.process_pass().await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCore
// ---------------------------------------------------------------------------

/// The core service: secure persistence plus resilient AI orchestration
/// behind session-scoped commands.
pub struct SessionCore {
    config: CoreConfig,
    store: Arc<SecureStore>,
    engine: Arc<SuggestionEngine>,
    events: EventBus,
    transcriber: Arc<dyn Transcriber>,
    gate: Arc<dyn CaptureGate>,
    active: Option<ActiveSession>,
    last_session_id: Option<Uuid>,
    degraded_reported: bool,
    maintenance: tokio::task::JoinHandle<()>,
}

impl SessionCore {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Open the core at the platform-default paths, with providers built
    /// from `config.providers`.
    ///
    /// Must be called inside a tokio runtime (a maintenance task is
    /// spawned).  A disk failure opening the store degrades to ephemeral
    /// mode rather than erroring; only key-management failures propagate.
    pub fn open(
        config: CoreConfig,
        transcriber: Arc<dyn Transcriber>,
        gate: Arc<dyn CaptureGate>,
    ) -> Result<Self, CoreError> {
        let paths = AppPaths::new();
        let keys = config
            .storage
            .key_backend
            .provider(AppPaths::keyring_service(), &paths.key_file);
        Self::open_at(&paths.store_dir, keys, config, transcriber, gate)
    }

    /// Open the core against an explicit store path and key provider.
    pub fn open_at(
        store_dir: &Path,
        keys: Box<dyn KeyProvider>,
        config: CoreConfig,
        transcriber: Arc<dyn Transcriber>,
        gate: Arc<dyn CaptureGate>,
    ) -> Result<Self, CoreError> {
        let store = Arc::new(SecureStore::open(store_dir, keys)?);
        let providers = Self::build_providers(&config.providers);
        Ok(Self::open_with(store, providers, transcriber, gate, config))
    }

    /// Fully dependency-injected constructor (used directly by tests).
    pub fn open_with(
        store: Arc<SecureStore>,
        providers: Vec<Arc<dyn Provider>>,
        transcriber: Arc<dyn Transcriber>,
        gate: Arc<dyn CaptureGate>,
        config: CoreConfig,
    ) -> Self {
        let events = EventBus::new(128);
        let engine = Arc::new(SuggestionEngine::new(
            Arc::clone(&store),
            providers,
            Self::engine_config(&config.providers),
        ));
        let maintenance = spawn_maintenance_task(
            Arc::clone(&store),
            MaintenanceConfig {
                retention_days: config.storage.retention_days,
                interval: Duration::from_secs(config.storage.maintenance_interval_secs),
            },
        );

        Self {
            config,
            store,
            engine,
            events,
            transcriber,
            gate,
            active: None,
            last_session_id: None,
            degraded_reported: false,
            maintenance,
        }
    }

    /// Build `ApiProvider`s for the configured chain, active entry first.
    fn build_providers(settings: &ProvidersSettings) -> Vec<Arc<dyn Provider>> {
        settings
            .ordered_chain()
            .into_iter()
            .map(|p| {
                Arc::new(ApiProvider::new(
                    p,
                    Duration::from_secs(settings.timeout_secs),
                )) as Arc<dyn Provider>
            })
            .collect()
    }

    fn engine_config(settings: &ProvidersSettings) -> EngineConfig {
        EngineConfig {
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            cache_capacity: settings.cache_capacity,
            rate_quota: settings.rate_quota,
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                base_delay: Duration::from_millis(settings.backoff_base_ms),
                call_timeout: Duration::from_secs(settings.timeout_secs),
            },
            generate: GenerateOptions {
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            },
            ..EngineConfig::default()
        }
    }

    fn transcription_config(settings: &TranscriptionSettings) -> TranscriptionConfig {
        TranscriptionConfig {
            sample_rate: settings.sample_rate,
            max_buffer_secs: settings.max_buffer_secs,
            min_buffer_secs: settings.min_buffer_secs,
            tick_interval: Duration::from_millis(settings.tick_interval_ms),
            confidence_threshold: settings.confidence_threshold,
            max_consecutive_errors: settings.max_consecutive_errors,
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
            ..TranscriptionConfig::default()
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Subscribe to core events.  Drop the handle to unsubscribe.
    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    /// `false` when the store is running in ephemeral (non-durable) mode.
    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    /// Direct handle to the secure store.
    pub fn store(&self) -> &Arc<SecureStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Create a session row and start transcription for it.
    ///
    /// An already-active session is stopped first.  A transcription backend
    /// that fails to initialize leaves the new session in the `Disabled`
    /// state (signaled via `TranscriptionDisabled`); the session row exists
    /// either way and the call succeeds.
    pub async fn start_session(&mut self, options: SessionOptions) -> Result<Session, CoreError> {
        if self.active.is_some() {
            log::warn!("core: starting a new session while one is active; stopping the old one");
            let _ = self.stop_session().await;
        }

        // Surface store degradation once, where the caller is listening.
        if !self.store.is_durable() && !self.degraded_reported {
            self.degraded_reported = true;
            self.events.emit(CoreEvent::PersistenceDegraded);
        }

        let session = self.store.create_session(options)?;
        self.last_session_id = Some(session.id);

        let mut transcription = TranscriptionSession::new(
            session.id,
            Arc::clone(&self.store),
            Arc::clone(&self.transcriber),
            Arc::clone(&self.gate),
            self.events.clone(),
            Self::transcription_config(&self.config.transcription),
        );

        let state = transcription.start().await;
        let driver = if state == crate::transcription::SessionState::Recording {
            let tick = transcription_tick(&self.config.transcription);
            let (cmd_tx, cmd_rx) = mpsc::channel(64);
            let task = tokio::spawn(drive_session(transcription, cmd_rx, tick));
            Some(SessionDriver { cmd_tx, task })
        } else {
            None
        };

        self.active = Some(ActiveSession {
            session_id: session.id,
            kind: session.kind,
            driver,
        });
        self.events.emit(CoreEvent::SessionStarted {
            session_id: session.id,
        });
        Ok(session)
    }

    /// Forward captured audio to the active session's driver.
    ///
    /// Silently dropped when no session is recording — capture callbacks
    /// must never fail the producer.
    pub async fn push_audio(&self, samples: Vec<f32>) {
        let Some(driver) = self.active.as_ref().and_then(|a| a.driver.as_ref()) else {
            log::debug!("core: audio dropped, no recording session");
            return;
        };
        if driver
            .cmd_tx
            .send(SessionCommand::Audio(samples))
            .await
            .is_err()
        {
            log::warn!("core: audio dropped, session driver is gone");
        }
    }

    /// Stop the active session: halt transcription, set `ended_at`, and
    /// generate a session-summary suggestion batch from the transcript.
    pub async fn stop_session(&mut self) -> Result<SessionSummary, CoreError> {
        let active = self.active.take().ok_or(CoreError::NoActiveSession)?;

        if let Some(driver) = active.driver {
            let (ack_tx, ack_rx) = oneshot::channel();
            if driver
                .cmd_tx
                .send(SessionCommand::Stop { ack: ack_tx })
                .await
                .is_ok()
            {
                let _ = ack_rx.await;
            }
            if let Err(e) = driver.task.await {
                log::warn!("core: session driver ended abnormally: {e}");
            }
        }

        let session = self.store.update_session(
            active.session_id,
            SessionPatch {
                ended_at: Some(Utc::now()),
                ..Default::default()
            },
        )?;

        let transcript = self.transcript_text(active.session_id)?;
        let batch = self
            .engine
            .get_suggestions(&transcript, pipeline_for(active.kind), Some(active.session_id))
            .await;
        let summary = batch
            .suggestions
            .iter()
            .map(|s| s.content.clone())
            .collect();

        self.events.emit(CoreEvent::SessionEnded {
            session_id: session.id,
        });
        Ok(SessionSummary {
            session_id: session.id,
            summary,
        })
    }

    /// Generate suggestions for arbitrary context.
    ///
    /// Never fails: an unknown pipeline tag is logged and served the chat
    /// pipeline's deterministic fallback batch, matching the engine's
    /// never-throw contract.
    pub async fn get_suggestions(
        &self,
        context: &str,
        options: GetSuggestionsOptions,
    ) -> Vec<Suggestion> {
        let batch = match options.pipeline.parse::<Pipeline>() {
            Ok(pipeline) => {
                self.engine
                    .get_suggestions(context, pipeline, options.session_id)
                    .await
            }
            Err(e) => {
                log::warn!("core: {e}; serving chat fallback batch");
                self.engine.validation_fallback(Pipeline::Chat)
            }
        };
        batch.suggestions
    }

    /// Accepted transcript text of the active (or most recent) session,
    /// oldest segment first.
    pub fn partial_transcript(&self) -> String {
        let session_id = self
            .active
            .as_ref()
            .map(|a| a.session_id)
            .or(self.last_session_id);
        let Some(id) = session_id else {
            return String::new();
        };
        self.transcript_text(id).unwrap_or_else(|e| {
            log::warn!("core: partial transcript unavailable: {e}");
            String::new()
        })
    }

    /// Overwrite the user profile.
    pub fn save_profile(&self, profile: &Profile) -> Result<(), CoreError> {
        Ok(self.store.save_profile(profile)?)
    }

    /// Fetch the user profile, if any.
    pub fn profile(&self) -> Result<Option<Profile>, CoreError> {
        Ok(self.store.get_profile()?)
    }

    /// Record that the user acted on a suggestion.
    pub fn mark_suggestion_accepted(
        &self,
        session_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<bool, CoreError> {
        Ok(self.store.mark_suggestion_accepted(session_id, suggestion_id)?)
    }

    /// Stop any active session, clear every table, and destroy the
    /// encryption key.
    pub async fn wipe_all_data(&mut self) -> Result<(), CoreError> {
        if self.active.is_some() {
            let _ = self.stop_session().await;
        }
        self.last_session_id = None;
        self.store.wipe_all_data()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn transcript_text(&self, session_id: Uuid) -> Result<String, StoreError> {
        let segments = self.store.get_transcripts(session_id)?;
        Ok(segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.maintenance.abort();
        if let Some(active) = &self.active {
            if let Some(driver) = &active.driver {
                driver.task.abort();
            }
        }
    }
}

/// Summary generation uses the pipeline matching the session kind.
fn pipeline_for(kind: SessionKind) -> Pipeline {
    match kind {
        SessionKind::Interview => Pipeline::Interview,
        SessionKind::Meeting => Pipeline::Meeting,
        SessionKind::Chat => Pipeline::Chat,
    }
}

fn transcription_tick(settings: &TranscriptionSettings) -> Duration {
    Duration::from_millis(settings.tick_interval_ms.max(1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

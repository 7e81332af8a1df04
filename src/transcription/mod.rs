//! Transcription session — lifecycle of one audio-to-text stream.
//!
//! [`TranscriptionSession`] owns the buffering, periodic processing,
//! confidence gating, redaction, persistence, and failure handling for a
//! single session:
//!
//! * [`buffer`] — bounded accumulation buffer with snapshot-and-clear drain.
//! * [`transcriber`] — the injected speech-to-text backend and capture gate.
//! * [`maintenance`] — periodic retention/cache cleanup task.
//!
//! # State machine
//!
//! ```text
//! Idle ──start()──▶ Starting ──ok──▶ Recording ⇄ Processing
//!                        │                │
//!                        └─init failed──▶ Disabled   (event, not error)
//!                                          │
//! Recording ──breaker trip──▶ Error  (single SessionError event)
//! any active state ──stop()──▶ Stopping ──▶ Idle
//! ```
//!
//! `stop()` from `Idle`/`Disabled` is a no-op success.  Processing passes
//! are driven externally (one call to [`TranscriptionSession::process_pass`]
//! per timer tick) and are strictly sequential — the next pass cannot start
//! until the previous buffer swap completed.

pub mod buffer;
pub mod maintenance;
pub mod transcriber;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::events::{CoreEvent, EventBus};
use crate::security::redact_pii;
use crate::store::entities::TranscriptSegment;
use crate::store::SecureStore;

pub use buffer::AudioBuffer;
pub use transcriber::{
    AlwaysAvailable, CaptureGate, TranscribeError, Transcriber, Transcript,
    UnavailableTranscriber,
};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of a transcription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not running; `start()` may be called.
    Idle,
    /// `start()` is checking the capture gate and initializing the backend.
    Starting,
    /// Audio is accumulating; passes run on each tick.
    Recording,
    /// A transcription pass is in flight.
    Processing,
    /// `stop()` is tearing the session down.
    Stopping,
    /// The backend or capture device never initialized.  Terminal until the
    /// next `start()`.
    Disabled,
    /// The circuit breaker force-stopped the session.
    Error,
}

impl SessionState {
    /// `true` while the session is capturing or processing audio.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Starting
                | SessionState::Recording
                | SessionState::Processing
                | SessionState::Stopping
        )
    }

    /// Short label for logs and status displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Starting => "Starting",
            SessionState::Recording => "Recording",
            SessionState::Processing => "Processing",
            SessionState::Stopping => "Stopping",
            SessionState::Disabled => "Disabled",
            SessionState::Error => "Error",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Tunables for one transcription session.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Sample rate of the incoming audio in Hz.
    pub sample_rate: u32,
    /// Buffer capacity in seconds; older audio is overwritten past this.
    pub max_buffer_secs: f32,
    /// A pass is skipped (samples retained) below this much audio.
    pub min_buffer_secs: f32,
    /// How often the driver should invoke a processing pass.
    pub tick_interval: Duration,
    /// Results below this confidence are rejected.
    pub confidence_threshold: f32,
    /// Circuit-breaker threshold for consecutive pass failures.
    pub max_consecutive_errors: u32,
    /// Attempts per transcription call, including the first.
    pub max_attempts: u32,
    /// Exponential-backoff base between attempts.
    pub base_delay: Duration,
    /// Hard deadline per transcription attempt.
    pub call_timeout: Duration,
    /// Speaker label recorded on persisted segments.
    pub speaker: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_buffer_secs: 60.0,
            min_buffer_secs: 0.5,
            tick_interval: Duration::from_secs(1),
            confidence_threshold: 0.7,
            max_consecutive_errors: 5,
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            call_timeout: Duration::from_secs(10),
            speaker: "speaker".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PassOutcome
// ---------------------------------------------------------------------------

/// Why a rejected result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Confidence below the configured threshold.
    LowConfidence,
    /// Identical to the previously accepted text (overlapping windows).
    Duplicate,
    /// The backend returned only whitespace.
    Empty,
}

/// Result of one processing pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The session is not recording; nothing was done.
    Inactive,
    /// Below the minimum buffered duration; samples were retained.
    BufferTooShort,
    /// A segment was accepted, persisted, and emitted.
    Accepted(TranscriptSegment),
    /// The backend answered but the result was gated out.
    Rejected(RejectReason),
    /// The pass failed; the session keeps recording.
    Failed { consecutive_failures: u32 },
    /// The failure threshold was reached; the session is now `Error`.
    BreakerTripped,
}

// ---------------------------------------------------------------------------
// TranscriptionSession
// ---------------------------------------------------------------------------

/// One audio-to-text session.
///
/// The capture producer appends samples via the shared buffer handle; a
/// driver task calls [`process_pass`](Self::process_pass) once per tick.
pub struct TranscriptionSession {
    session_id: Uuid,
    store: Arc<SecureStore>,
    backend: Arc<dyn Transcriber>,
    gate: Arc<dyn CaptureGate>,
    events: EventBus,
    config: TranscriptionConfig,
    state: SessionState,
    buffer: Arc<Mutex<AudioBuffer>>,
    last_accepted: Option<String>,
    consecutive_failures: u32,
    breaker_reported: bool,
}

impl TranscriptionSession {
    /// Create a session for an existing session row.
    pub fn new(
        session_id: Uuid,
        store: Arc<SecureStore>,
        backend: Arc<dyn Transcriber>,
        gate: Arc<dyn CaptureGate>,
        events: EventBus,
        config: TranscriptionConfig,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(AudioBuffer::new(
            config.sample_rate,
            config.max_buffer_secs,
        )));
        Self {
            session_id,
            store,
            backend,
            gate,
            events,
            config,
            state: SessionState::Idle,
            buffer,
            last_accepted: None,
            consecutive_failures: 0,
            breaker_reported: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session row this transcription feeds.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Shared buffer handle for the capture producer.
    pub fn buffer_handle(&self) -> Arc<Mutex<AudioBuffer>> {
        Arc::clone(&self.buffer)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attempt to start (or restart) the session.
    ///
    /// Checks the capture gate, then initializes the backend.  Failure of
    /// either lands in `Disabled` and emits a `TranscriptionDisabled` event
    /// — it is a signaled outcome, not an error.
    pub async fn start(&mut self) -> SessionState {
        match self.state {
            SessionState::Idle | SessionState::Disabled | SessionState::Error => {}
            other => return other,
        }
        self.state = SessionState::Starting;

        if let Err(e) = self.gate.check() {
            log::warn!("transcription: capture unavailable: {e}");
            return self.disable(e.to_string());
        }
        if let Err(e) = self.backend.initialize().await {
            log::warn!("transcription: backend failed to initialize: {e}");
            return self.disable(e.to_string());
        }

        self.buffer.lock().unwrap().clear();
        self.last_accepted = None;
        self.consecutive_failures = 0;
        self.breaker_reported = false;
        self.state = SessionState::Recording;
        log::info!("transcription: session {} recording", self.session_id);
        self.state
    }

    /// Stop the session.  Idempotent: stopping from `Idle` or `Disabled` is
    /// a no-op success.
    pub fn stop(&mut self) -> SessionState {
        match self.state {
            SessionState::Idle | SessionState::Disabled => self.state,
            _ => {
                self.state = SessionState::Stopping;
                self.buffer.lock().unwrap().clear();
                self.state = SessionState::Idle;
                log::info!("transcription: session {} stopped", self.session_id);
                self.state
            }
        }
    }

    /// Append captured samples.  Ignored unless the session is active.
    pub fn push_audio(&self, samples: &[f32]) {
        if matches!(
            self.state,
            SessionState::Recording | SessionState::Processing
        ) {
            self.buffer.lock().unwrap().push_slice(samples);
        }
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// Run one processing pass: snapshot the buffer, transcribe with
    /// retries, gate, redact, persist, emit.
    ///
    /// Callers must not overlap passes; the driver loop awaits each pass
    /// before the next tick, which keeps transcript emission in order.
    pub async fn process_pass(&mut self) -> PassOutcome {
        if self.state != SessionState::Recording {
            return PassOutcome::Inactive;
        }

        // Snapshot-and-clear under the lock; partial buffers are retained.
        let audio = {
            let mut buf = self.buffer.lock().unwrap();
            if !buf.has_at_least(self.config.min_buffer_secs) {
                return PassOutcome::BufferTooShort;
            }
            buf.drain()
        };

        self.state = SessionState::Processing;
        let result = self.transcribe_with_retry(&audio).await;
        match result {
            Ok(transcript) => {
                self.consecutive_failures = 0;
                self.state = SessionState::Recording;
                self.accept(transcript)
            }
            Err(e) => {
                log::warn!(
                    "transcription: pass failed for session {}: {e}",
                    self.session_id
                );
                self.record_failure()
            }
        }
    }

    /// Confidence gate, duplicate suppression, redaction, persistence.
    fn accept(&mut self, transcript: Transcript) -> PassOutcome {
        let text = transcript.text.trim();
        if text.is_empty() {
            return PassOutcome::Rejected(RejectReason::Empty);
        }
        if transcript.confidence < self.config.confidence_threshold {
            log::debug!(
                "transcription: rejected at confidence {:.2} (< {:.2})",
                transcript.confidence,
                self.config.confidence_threshold
            );
            return PassOutcome::Rejected(RejectReason::LowConfidence);
        }
        if self.last_accepted.as_deref() == Some(text) {
            return PassOutcome::Rejected(RejectReason::Duplicate);
        }

        let redacted = redact_pii(text);
        match self.store.add_transcript(
            self.session_id,
            &self.config.speaker,
            &redacted,
            transcript.confidence,
        ) {
            Ok(segment) => {
                self.last_accepted = Some(text.to_string());
                self.events.emit(CoreEvent::Transcript {
                    session_id: self.session_id,
                    segment: segment.clone(),
                });
                PassOutcome::Accepted(segment)
            }
            Err(e) => {
                log::warn!("transcription: failed to persist segment: {e}");
                self.record_failure()
            }
        }
    }

    /// Count a pass failure; trip the breaker at the threshold.
    fn record_failure(&mut self) -> PassOutcome {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_consecutive_errors {
            self.state = SessionState::Error;
            self.buffer.lock().unwrap().clear();
            if !self.breaker_reported {
                self.breaker_reported = true;
                self.events.emit(CoreEvent::SessionError {
                    session_id: self.session_id,
                    message: format!(
                        "transcription stopped after {} consecutive failures",
                        self.consecutive_failures
                    ),
                });
                log::error!(
                    "transcription: circuit breaker tripped for session {}",
                    self.session_id
                );
            }
            PassOutcome::BreakerTripped
        } else {
            self.state = SessionState::Recording;
            PassOutcome::Failed {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }

    fn disable(&mut self, reason: String) -> SessionState {
        self.state = SessionState::Disabled;
        self.events.emit(CoreEvent::TranscriptionDisabled {
            session_id: self.session_id,
            reason,
        });
        self.state
    }

    /// Transcribe with the engine-wide timeout/retry contract.  A deadline
    /// win drops the in-flight future, cancelling the call.
    async fn transcribe_with_retry(&self, audio: &[f32]) -> Result<Transcript, TranscribeError> {
        let mut attempt = 1u32;
        loop {
            let call = self.backend.transcribe(audio);
            let result = match tokio::time::timeout(self.config.call_timeout, call).await {
                Ok(inner) => inner,
                Err(_elapsed) => Err(TranscribeError::Timeout),
            };

            match result {
                Ok(transcript) => return Ok(transcript),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.base_delay * 2u32.saturating_pow(attempt - 1);
                    log::debug!(
                        "transcription: attempt {attempt} failed ({e}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

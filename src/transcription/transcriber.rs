//! Speech-to-text backend trait and test doubles.
//!
//! [`Transcriber`] is the capability interface every transcription backend
//! satisfies: `transcribe(audio) -> { text, confidence }`.  Backends are
//! injected — model loading, DSP, and wire formats live outside this crate.
//!
//! [`CaptureGate`] is the capture-device/permission precondition checked
//! once at session start; absence of a device is a startup outcome
//! (`Disabled`), never a runtime error mid-session.
//!
//! [`UnavailableTranscriber`] stands in when no backend is configured so a
//! session can still be constructed and report `Disabled` instead of
//! failing to build.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// Errors a transcription backend can produce.
#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    /// The backend could not be initialized (missing model, denied
    /// permission, dead service).
    #[error("transcriber unavailable: {0}")]
    Unavailable(String),

    /// A transcription pass failed.
    #[error("transcription failed: {0}")]
    Backend(String),

    /// The pass did not complete within the configured deadline.
    #[error("transcription timed out")]
    Timeout,
}

impl TranscribeError {
    /// Timeouts and backend hiccups are retried; `Unavailable` is not — it
    /// means the session should never have started.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TranscribeError::Backend(_) | TranscribeError::Timeout
        )
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// One transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text backends.
///
/// # Contract
///
/// - `audio` is mono `f32` PCM at the session's configured sample rate.
/// - `initialize` is called exactly once, at session start; failure puts the
///   session into `Disabled` rather than erroring.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Prepare the backend (load model, connect, check permission).
    async fn initialize(&self) -> Result<(), TranscribeError>;

    /// Transcribe one audio window.
    async fn transcribe(&self, audio: &[f32]) -> Result<Transcript, TranscribeError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// CaptureGate
// ---------------------------------------------------------------------------

/// Capture-device availability/permission check, evaluated at session start.
pub trait CaptureGate: Send + Sync {
    /// `Ok` when audio capture is possible right now.
    fn check(&self) -> Result<(), TranscribeError>;
}

/// Gate that always passes — for hosts where capture is managed externally.
pub struct AlwaysAvailable;

impl CaptureGate for AlwaysAvailable {
    fn check(&self) -> Result<(), TranscribeError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UnavailableTranscriber
// ---------------------------------------------------------------------------

/// Stub used when no backend is configured: `initialize` always fails with
/// an explanatory error, so `start()` lands in `Disabled` and the rest of
/// the application keeps running.
pub struct UnavailableTranscriber {
    reason: String,
}

impl UnavailableTranscriber {
    /// Create a stub that reports `reason` on initialization.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn initialize(&self) -> Result<(), TranscribeError> {
        Err(TranscribeError::Unavailable(self.reason.clone()))
    }

    async fn transcribe(&self, _audio: &[f32]) -> Result<Transcript, TranscribeError> {
        Err(TranscribeError::Unavailable(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// Scripted test double that counts calls.
#[cfg(test)]
pub struct MockTranscriber {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Transcript, TranscribeError>>>,
    default: Result<Transcript, TranscribeError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockTranscriber {
    /// Always returns `Ok` with the given text and confidence.
    pub fn ok(text: &str, confidence: f32) -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: Ok(Transcript {
                text: text.to_string(),
                confidence,
            }),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Always returns the given error.
    pub fn err(error: TranscribeError) -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: Err(error),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Plays `script` in order, then repeats `default`.
    pub fn scripted(
        script: Vec<Result<Transcript, TranscribeError>>,
        default: Result<Transcript, TranscribeError>,
    ) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            default,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `transcribe` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Transcriber for MockTranscriber {
    async fn initialize(&self) -> Result<(), TranscribeError> {
        Ok(())
    }

    async fn transcribe(&self, _audio: &[f32]) -> Result<Transcript, TranscribeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => self.default.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_stub_fails_initialize_with_reason() {
        let stub = UnavailableTranscriber::new("no model configured");
        let err = stub.initialize().await.unwrap_err();
        assert!(matches!(err, TranscribeError::Unavailable(_)));
        assert!(err.to_string().contains("no model configured"));
    }

    #[tokio::test]
    async fn mock_plays_script_then_default() {
        let mock = MockTranscriber::scripted(
            vec![Err(TranscribeError::Backend("hiccup".into()))],
            Ok(Transcript {
                text: "hello".into(),
                confidence: 0.9,
            }),
        );
        assert!(mock.transcribe(&[0.0]).await.is_err());
        assert_eq!(mock.transcribe(&[0.0]).await.unwrap().text, "hello");
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn transient_classification() {
        assert!(TranscribeError::Backend("x".into()).is_transient());
        assert!(TranscribeError::Timeout.is_transient());
        assert!(!TranscribeError::Unavailable("x".into()).is_transient());
    }

    #[test]
    fn always_available_gate_passes() {
        assert!(AlwaysAvailable.check().is_ok());
    }

    /// If this compiles, the trait is object-safe.
    #[test]
    fn box_dyn_transcriber_compiles() {
        let _: Box<dyn Transcriber> = Box::new(UnavailableTranscriber::new("none"));
    }
}

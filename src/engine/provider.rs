//! Text-generation provider trait and the OpenAI-compatible implementation.
//!
//! [`Provider`] is the capability interface every backend satisfies:
//! `generate(system, user, opts) -> text`.  [`ApiProvider`] speaks the
//! OpenAI chat-completions wire format and therefore covers OpenAI, Groq,
//! Together.ai, LM Studio, vLLM, Ollama (OpenAI mode) and similar services.
//!
//! [`call_with_retry`] wraps any provider call in the engine's resilience
//! contract: a hard deadline via `tokio::time::timeout` (the in-flight
//! future is dropped when the timer wins, cancelling the request), plus
//! bounded retries with exponential backoff for transient failures only.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Errors a provider call can produce.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// HTTP transport or connection error.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The backend signalled rate limiting (HTTP 429).
    #[error("provider rate limited")]
    RateLimited,

    /// The backend returned a server error (HTTP 5xx).
    #[error("provider server error (HTTP {0})")]
    Server(u16),

    /// The call did not complete within the configured deadline.
    #[error("provider request timed out")]
    Timeout,

    /// The response body could not be parsed.
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// The response contained no usable text.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Transient failures are worth retrying; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Server(_) | ProviderError::Timeout
        )
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Generation options forwarded to the backend.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Response length cap in tokens.
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 512,
        }
    }
}

/// Object-safe, thread-safe interface for text-generation backends.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn Provider>` and shared across tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used for rate limiting and logging.
    fn id(&self) -> &str;

    /// Generate text for the given prompt pair.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, ProviderError>;
}

// Compile-time assertion: Box<dyn Provider> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Provider>) {}
};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded-retry parameters shared by provider and transcriber calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (≥ 1).
    pub max_attempts: u32,
    /// Backoff before attempt *n+1* is `base_delay × 2^(n−1)`.
    pub base_delay: Duration,
    /// Hard deadline for a single attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Call `provider` under the retry contract.
///
/// Each attempt races against `policy.call_timeout`; when the timer wins the
/// attempt's future is dropped — the request is cancelled, its eventual
/// result cannot leak in later.  Only transient errors are retried, with
/// exponential backoff, up to `policy.max_attempts`.
pub async fn call_with_retry(
    provider: &dyn Provider,
    system_prompt: &str,
    user_prompt: &str,
    opts: &GenerateOptions,
    policy: &RetryPolicy,
) -> Result<String, ProviderError> {
    let mut attempt = 1u32;
    loop {
        let call = provider.generate(system_prompt, user_prompt, opts);
        let result = match tokio::time::timeout(policy.call_timeout, call).await {
            Ok(inner) => inner,
            Err(_elapsed) => Err(ProviderError::Timeout),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                log::debug!(
                    "provider {}: attempt {attempt} failed ({e}), retrying in {delay:?}",
                    provider.id()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                log::warn!(
                    "provider {}: giving up after attempt {attempt}: {e}",
                    provider.id()
                );
                return Err(e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// ApiProvider
// ---------------------------------------------------------------------------

/// Connection settings for one [`ApiProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    /// Identifier used in the fallback chain, rate limiter, and logs.
    pub id: String,
    /// Base URL of the API endpoint (e.g. `https://api.openai.com`).
    pub base_url: String,
    /// API key — `None` for local providers that need no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
}

/// Calls any OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// All connection details come from [`ProviderSettings`]; nothing is
/// hardcoded.  The `Authorization: Bearer …` header is attached only when a
/// non-empty API key is configured.
pub struct ApiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl ApiProvider {
    /// Build a provider from settings.
    ///
    /// `request_timeout` is a client-level bound on any single HTTP request;
    /// the engine's [`RetryPolicy::call_timeout`] remains the authoritative
    /// deadline.
    pub fn new(settings: ProviderSettings, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, settings }
    }
}

#[async_trait]
impl Provider for ApiProvider {
    fn id(&self) -> &str {
        &self.settings.id
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        let body = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };

        let mut req = self.client.post(&url).json(&body);
        let key = self.settings.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ProviderError::Server(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ProviderError::Request(format!("HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// MockProvider  (test-only)
// ---------------------------------------------------------------------------

/// A scripted test double that records how many times it was called.
#[cfg(test)]
pub struct MockProvider {
    id: String,
    script: std::sync::Mutex<std::collections::VecDeque<Result<String, ProviderError>>>,
    /// Result returned once the script runs dry.
    default: Result<String, ProviderError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    /// A mock that always returns `Ok(text)`.
    pub fn ok(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: Ok(text.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A mock that always returns `Err(error)`.
    pub fn err(id: &str, error: ProviderError) -> Self {
        Self {
            id: id.to_string(),
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: Err(error),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A mock that plays `script` in order, then repeats `default`.
    pub fn scripted(
        id: &str,
        script: Vec<Result<String, ProviderError>>,
        default: Result<String, ProviderError>,
    ) -> Self {
        Self {
            id: id.to_string(),
            script: std::sync::Mutex::new(script.into()),
            default,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `generate` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _opts: &GenerateOptions,
    ) -> Result<String, ProviderError> {
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

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_millis(200),
        }
    }

    // ---- RetryPolicy -------------------------------------------------------

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    // ---- call_with_retry ---------------------------------------------------

    #[tokio::test]
    async fn success_on_first_attempt() {
        let provider = MockProvider::ok("p1", "hello");
        let out = call_with_retry(&provider, "s", "u", &GenerateOptions::default(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(out, "hello");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let provider = MockProvider::scripted(
            "p1",
            vec![Err(ProviderError::Server(500)), Err(ProviderError::RateLimited)],
            Ok("eventually".into()),
        );
        let out = call_with_retry(&provider, "s", "u", &GenerateOptions::default(), &fast_policy())
            .await
            .unwrap();
        assert_eq!(out, "eventually");
        assert_eq!(provider.calls(), 3, "two failures + one success");
    }

    #[tokio::test]
    async fn retries_cap_at_max_attempts() {
        let provider = MockProvider::err("p1", ProviderError::Server(503));
        let err = call_with_retry(&provider, "s", "u", &GenerateOptions::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Server(503)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let provider = MockProvider::err("p1", ProviderError::Parse("bad json".into()));
        let err = call_with_retry(&provider, "s", "u", &GenerateOptions::default(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert_eq!(provider.calls(), 1, "parse errors must not be retried");
    }

    #[tokio::test]
    async fn deadline_converts_to_timeout_and_is_retried() {
        /// Never completes — stands in for a hung backend.
        struct HangingProvider;

        #[async_trait]
        impl Provider for HangingProvider {
            fn id(&self) -> &str {
                "hang"
            }
            async fn generate(
                &self,
                _s: &str,
                _u: &str,
                _o: &GenerateOptions,
            ) -> Result<String, ProviderError> {
                std::future::pending().await
            }
        }

        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_millis(20),
        };
        let err = call_with_retry(
            &HangingProvider,
            "s",
            "u",
            &GenerateOptions::default(),
            &policy,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout));
    }

    // ---- Error taxonomy ----------------------------------------------------

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Server(502).is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::Parse("x".into()).is_transient());
        assert!(!ProviderError::EmptyResponse.is_transient());
        assert!(!ProviderError::Request("refused".into()).is_transient());
    }

    // ---- ApiProvider construction -----------------------------------------

    #[test]
    fn api_provider_builds_from_settings() {
        let provider = ApiProvider::new(
            ProviderSettings {
                id: "primary".into(),
                base_url: "http://localhost:11434".into(),
                api_key: None,
                model: "qwen2.5:3b".into(),
            },
            Duration::from_secs(10),
        );
        assert_eq!(provider.id(), "primary");
    }

    /// Verify `ApiProvider` is object-safe (usable as `dyn Provider`).
    #[test]
    fn provider_is_object_safe() {
        let provider: Box<dyn Provider> = Box::new(ApiProvider::new(
            ProviderSettings {
                id: "p".into(),
                base_url: "http://localhost".into(),
                api_key: Some("sk-test".into()),
                model: "m".into(),
            },
            Duration::from_secs(1),
        ));
        drop(provider);
    }
}

//! Core settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Unknown-on-disk fields fall back to defaults via `#[serde(default)]`, so
//! older settings files keep loading after upgrades.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::ProviderSettings;
use crate::store::KeyBackend;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ModelSize
// ---------------------------------------------------------------------------

/// Transcription model size — the speed/accuracy trade-off handed to the
/// injected backend at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl Default for ModelSize {
    fn default() -> Self {
        Self::Base
    }
}

// ---------------------------------------------------------------------------
// TranscriptionSettings
// ---------------------------------------------------------------------------

/// Settings for the transcription session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Model size hint passed to the transcription backend.
    pub model_size: ModelSize,
    /// Results below this confidence (0.0 – 1.0) are rejected.
    pub confidence_threshold: f32,
    /// Sample rate of incoming audio in Hz.
    pub sample_rate: u32,
    /// Minimum buffered audio before a processing pass runs, in seconds.
    pub min_buffer_secs: f32,
    /// Buffer capacity in seconds; older audio is overwritten past this.
    pub max_buffer_secs: f32,
    /// Milliseconds between processing passes.
    pub tick_interval_ms: u64,
    /// Consecutive pass failures before the circuit breaker trips.
    pub max_consecutive_errors: u32,
    /// Attempts per transcription call, including the first.
    pub max_attempts: u32,
    /// Exponential-backoff base between attempts, in milliseconds.
    pub backoff_base_ms: u64,
    /// Hard deadline per transcription attempt, in seconds.
    pub call_timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model_size: ModelSize::default(),
            confidence_threshold: 0.7,
            sample_rate: 16_000,
            min_buffer_secs: 0.5,
            max_buffer_secs: 60.0,
            tick_interval_ms: 1_000,
            max_consecutive_errors: 5,
            max_attempts: 3,
            backoff_base_ms: 250,
            call_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// ProvidersSettings
// ---------------------------------------------------------------------------

/// Settings for the suggestion engine's provider stack.
///
/// `chain` is the fixed fallback order; `active` selects which entry is
/// tried first (the rest keep their configured order).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSettings {
    /// Id of the primary provider.  Must name an entry of `chain`.
    pub active: String,
    /// Every configured provider, in fallback order.
    pub chain: Vec<ProviderSettings>,
    /// Per-attempt HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per provider call, including the first.
    pub max_attempts: u32,
    /// Exponential-backoff base between attempts, in milliseconds.
    pub backoff_base_ms: u64,
    /// Requests allowed per provider per 60-second window.
    pub rate_quota: u32,
    /// Sampling temperature forwarded to providers.
    pub temperature: f32,
    /// Response token cap forwarded to providers.
    pub max_tokens: u32,
    /// Suggestion-cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Suggestion-cache entry bound.
    pub cache_capacity: usize,
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            active: String::new(),
            chain: Vec::new(),
            timeout_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 500,
            rate_quota: 30,
            temperature: 0.3,
            max_tokens: 512,
            cache_ttl_secs: 300,
            cache_capacity: 64,
        }
    }
}

impl ProvidersSettings {
    /// The chain with the active provider moved to the front.  Entries keep
    /// their configured order otherwise; an `active` id that names no entry
    /// leaves the order untouched.
    pub fn ordered_chain(&self) -> Vec<ProviderSettings> {
        let mut chain = self.chain.clone();
        if let Some(pos) = chain.iter().position(|p| p.id == self.active) {
            let primary = chain.remove(pos);
            chain.insert(0, primary);
        }
        chain
    }
}

// ---------------------------------------------------------------------------
// StorageSettings
// ---------------------------------------------------------------------------

/// Settings for the secure store and its maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Transcripts older than this many days are purged.  `0` keeps nothing.
    pub retention_days: u32,
    /// Seconds between maintenance sweeps.
    pub maintenance_interval_secs: u64,
    /// Which key backend holds the encryption key.
    pub key_backend: KeyBackend,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            retention_days: 30,
            maintenance_interval_secs: 60 * 60,
            key_backend: KeyBackend::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// CoreConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use copilot_core::config::CoreConfig;
///
/// // Load (returns Default when file is missing)
/// let config = CoreConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Transcription session settings.
    pub transcription: TranscriptionSettings,
    /// Suggestion-provider settings.
    pub providers: ProvidersSettings,
    /// Store and retention settings.
    pub storage: StorageSettings,
}

impl CoreConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(CoreConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provider(id: &str) -> ProviderSettings {
        ProviderSettings {
            id: id.into(),
            base_url: format!("https://{id}.example.com"),
            api_key: Some(format!("sk-{id}")),
            model: "default-model".into(),
        }
    }

    /// Verify default values match the design.
    #[test]
    fn default_values() {
        let cfg = CoreConfig::default();

        assert_eq!(cfg.transcription.model_size, ModelSize::Base);
        assert!((cfg.transcription.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.transcription.sample_rate, 16_000);
        assert!((cfg.transcription.min_buffer_secs - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.transcription.tick_interval_ms, 1_000);
        assert_eq!(cfg.transcription.max_consecutive_errors, 5);

        assert!(cfg.providers.chain.is_empty());
        assert_eq!(cfg.providers.rate_quota, 30);
        assert_eq!(cfg.providers.cache_ttl_secs, 300);

        assert_eq!(cfg.storage.retention_days, 30);
        assert_eq!(cfg.storage.key_backend, KeyBackend::Keyring);
    }

    /// Verify that a default `CoreConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = CoreConfig::default();
        original.save_to(&path).expect("save");

        let loaded = CoreConfig::load_from(&path).expect("load");
        assert_eq!(
            original.transcription.model_size,
            loaded.transcription.model_size
        );
        assert_eq!(
            original.transcription.confidence_threshold,
            loaded.transcription.confidence_threshold
        );
        assert_eq!(original.providers.rate_quota, loaded.providers.rate_quota);
        assert_eq!(original.storage.retention_days, loaded.storage.retention_days);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = CoreConfig::default();
        cfg.transcription.model_size = ModelSize::Large;
        cfg.transcription.confidence_threshold = 0.85;
        cfg.providers.active = "secondary".into();
        cfg.providers.chain = vec![provider("primary"), provider("secondary")];
        cfg.providers.rate_quota = 10;
        cfg.storage.retention_days = 7;
        cfg.storage.key_backend = KeyBackend::File;

        cfg.save_to(&path).expect("save");
        let loaded = CoreConfig::load_from(&path).expect("load");

        assert_eq!(loaded.transcription.model_size, ModelSize::Large);
        assert!((loaded.transcription.confidence_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(loaded.providers.active, "secondary");
        assert_eq!(loaded.providers.chain.len(), 2);
        assert_eq!(loaded.providers.chain[1].id, "secondary");
        assert_eq!(loaded.providers.rate_quota, 10);
        assert_eq!(loaded.storage.retention_days, 7);
        assert_eq!(loaded.storage.key_backend, KeyBackend::File);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = CoreConfig::load_from(&path).expect("should not error");
        assert_eq!(config.storage.retention_days, 30);
        assert!(config.providers.chain.is_empty());
    }

    // ---- ordered_chain -----------------------------------------------------

    #[test]
    fn ordered_chain_moves_active_to_front() {
        let settings = ProvidersSettings {
            active: "b".into(),
            chain: vec![provider("a"), provider("b"), provider("c")],
            ..ProvidersSettings::default()
        };
        let ids: Vec<String> = settings
            .ordered_chain()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn ordered_chain_with_unknown_active_keeps_order() {
        let settings = ProvidersSettings {
            active: "missing".into(),
            chain: vec![provider("a"), provider("b")],
            ..ProvidersSettings::default()
        };
        let ids: Vec<String> = settings
            .ordered_chain()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

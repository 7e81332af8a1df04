//! Encrypted-at-rest entity persistence.
//!
//! [`SecureStore`] owns one embedded `sled` database with one tree per
//! entity table.  Every record is serialized to JSON and sealed with
//! AES-256-GCM ([`crypto`]) before insertion, so nothing sensitive exists
//! unencrypted on disk; each row carries its own nonce and tag.
//!
//! * [`crypto`] — AEAD sealing and the `nonce ‖ tag ‖ ciphertext` layout.
//! * [`keys`] — key lifecycle via OS secret store or restricted key file.
//! * [`entities`] — the eight persisted entity types.
//!
//! # Degraded mode
//!
//! When the durable database directory cannot be opened (disk or permission
//! failure), the store falls back to an **ephemeral** temporary database
//! instead of aborting: callers check [`SecureStore::is_durable`] and the
//! facade surfaces the degradation exactly once as an event.
//!
//! # Wipe ordering
//!
//! [`SecureStore::wipe_all_data`] clears every tree and flushes before the
//! encryption key is destroyed.  The key is never destroyed while ciphertext
//! remains; an interrupted wipe leaves only sealed rows plus a still-valid
//! key, and can simply be retried.

pub mod crypto;
pub mod entities;
pub mod keys;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crypto::{CryptoError, RecordCipher};
use entities::{
    ActionItem, ContextCacheEntry, IntegrationCredential, Metric, Profile, Session,
    SessionOptions, SessionPatch, Suggestion, TranscriptSegment,
};
use keys::{KeyError, KeyProvider};

pub use crypto::{NONCE_LEN, TAG_LEN};
pub use keys::{FileKeyProvider, KeyBackend, KeyringProvider};

// ---------------------------------------------------------------------------
// Tree names
// ---------------------------------------------------------------------------

const TREE_SESSIONS: &str = "sessions";
const TREE_TRANSCRIPTS: &str = "transcripts";
const TREE_SUGGESTIONS: &str = "suggestions";
const TREE_ACTION_ITEMS: &str = "action_items";
const TREE_PROFILE: &str = "profile";
const TREE_INTEGRATIONS: &str = "integrations";
const TREE_METRICS: &str = "metrics";
const TREE_CONTEXT_CACHE: &str = "context_cache";

/// Every entity tree, in wipe order.
const ALL_TREES: &[&str] = &[
    TREE_SESSIONS,
    TREE_TRANSCRIPTS,
    TREE_SUGGESTIONS,
    TREE_ACTION_ITEMS,
    TREE_PROFILE,
    TREE_INTEGRATIONS,
    TREE_METRICS,
    TREE_CONTEXT_CACHE,
];

/// Singleton key for the profile tree.
const PROFILE_KEY: &[u8] = b"profile";

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by [`SecureStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The sled backend failed.
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    /// Sealing/opening a record failed.  [`CryptoError::Integrity`] means
    /// that specific record is unrecoverable; other records are unaffected.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The key backend failed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A write referenced a session id with no Session row.
    #[error("unknown session {0}")]
    UnknownSession(Uuid),

    /// JSON (de)serialization of a record failed.
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// `true` when this error means a single record failed authentication.
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Crypto(CryptoError::Integrity))
    }
}

// ---------------------------------------------------------------------------
// SecureStore
// ---------------------------------------------------------------------------

/// Durable, encrypted entity store.
///
/// Construct with [`SecureStore::open`]; all methods take `&self` and are
/// safe to call from any task holding an `Arc<SecureStore>`.
pub struct SecureStore {
    db: sled::Db,
    cipher: Mutex<RecordCipher>,
    keys: Box<dyn KeyProvider>,
    durable: bool,
}

impl SecureStore {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Open (or create) the store at `path`, obtaining the encryption key
    /// from `keys`.
    ///
    /// A disk or permission failure opening `path` degrades to an ephemeral
    /// temporary database with a warning instead of failing — check
    /// [`is_durable`](Self::is_durable).
    pub fn open(path: &Path, keys: Box<dyn KeyProvider>) -> Result<Self, StoreError> {
        let (db, durable) = match sled::open(path) {
            Ok(db) => (db, true),
            Err(e) => {
                log::warn!(
                    "secure store: cannot open {} ({e}); falling back to ephemeral in-memory store",
                    path.display()
                );
                let db = sled::Config::new().temporary(true).open()?;
                (db, false)
            }
        };

        let key = keys.load_or_create()?;
        Ok(Self {
            db,
            cipher: Mutex::new(RecordCipher::new(&key)),
            keys,
            durable,
        })
    }

    /// `false` when the store fell back to ephemeral mode at open time and
    /// session data will not survive the process.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    // -----------------------------------------------------------------------
    // Record codec helpers
    // -----------------------------------------------------------------------

    fn cipher(&self) -> RecordCipher {
        self.cipher.lock().unwrap().clone()
    }

    fn seal_record<T: Serialize>(&self, record: &T) -> Result<Vec<u8>, StoreError> {
        let plain = serde_json::to_vec(record)?;
        Ok(self.cipher().seal(&plain)?)
    }

    fn open_record<T: DeserializeOwned>(&self, blob: &[u8]) -> Result<T, StoreError> {
        let plain = self.cipher().open(blob)?;
        Ok(serde_json::from_slice(&plain)?)
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    fn require_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        if self.get_session(session_id)?.is_none() {
            return Err(StoreError::UnknownSession(session_id));
        }
        Ok(())
    }

    /// Chronologically sortable key: `{session}/{millis:020}/{id}`.
    fn timeline_key(session_id: Uuid, timestamp: DateTime<Utc>, id: Uuid) -> String {
        format!("{session_id}/{:020}/{id}", timestamp.timestamp_millis())
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Create and persist a new session row.
    pub fn create_session(&self, options: SessionOptions) -> Result<Session, StoreError> {
        let session = Session {
            id: Uuid::new_v4(),
            kind: options.kind,
            mode: options.mode,
            title: options.title,
            source_app: options.source_app,
            started_at: Utc::now(),
            ended_at: None,
            metadata: serde_json::Value::Null,
        };
        let blob = self.seal_record(&session)?;
        self.tree(TREE_SESSIONS)?
            .insert(session.id.to_string().as_bytes(), blob)?;
        Ok(session)
    }

    /// Apply `patch` to an existing session and return the updated row.
    pub fn update_session(
        &self,
        id: Uuid,
        patch: SessionPatch,
    ) -> Result<Session, StoreError> {
        let mut session = self
            .get_session(id)?
            .ok_or(StoreError::UnknownSession(id))?;

        if let Some(title) = patch.title {
            session.title = Some(title);
        }
        if let Some(ended_at) = patch.ended_at {
            session.ended_at = Some(ended_at);
        }
        if let Some(metadata) = patch.metadata {
            session.metadata = metadata;
        }

        let blob = self.seal_record(&session)?;
        self.tree(TREE_SESSIONS)?
            .insert(session.id.to_string().as_bytes(), blob)?;
        Ok(session)
    }

    /// Fetch a session by id.
    pub fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        match self.tree(TREE_SESSIONS)?.get(id.to_string().as_bytes())? {
            Some(blob) => Ok(Some(self.open_record(&blob)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Transcripts
    // -----------------------------------------------------------------------

    /// Persist one accepted transcript chunk.  The session must exist.
    pub fn add_transcript(
        &self,
        session_id: Uuid,
        speaker: &str,
        text: &str,
        confidence: f32,
    ) -> Result<TranscriptSegment, StoreError> {
        self.require_session(session_id)?;

        let segment = TranscriptSegment {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            speaker: speaker.to_string(),
            text: text.to_string(),
            confidence,
        };
        let key = Self::timeline_key(session_id, segment.timestamp, segment.id);
        let blob = self.seal_record(&segment)?;
        self.tree(TREE_TRANSCRIPTS)?.insert(key.as_bytes(), blob)?;
        Ok(segment)
    }

    /// All transcript segments for a session, oldest first.
    pub fn get_transcripts(&self, session_id: Uuid) -> Result<Vec<TranscriptSegment>, StoreError> {
        let prefix = format!("{session_id}/");
        let mut segments = Vec::new();
        for item in self.tree(TREE_TRANSCRIPTS)?.scan_prefix(prefix.as_bytes()) {
            let (_, blob) = item?;
            segments.push(self.open_record(&blob)?);
        }
        Ok(segments)
    }

    /// Remove transcript rows older than `cutoff`; returns how many were
    /// purged.  Row age is read from the timeline key, so no decryption is
    /// needed to decide.
    pub fn purge_transcripts_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let tree = self.tree(TREE_TRANSCRIPTS)?;
        let cutoff_millis = cutoff.timestamp_millis();
        let mut stale = Vec::new();

        for item in tree.iter() {
            let (key, _) = item?;
            let millis = std::str::from_utf8(&key)
                .ok()
                .and_then(|k| k.split('/').nth(1))
                .and_then(|m| m.parse::<i64>().ok());
            match millis {
                Some(m) if m < cutoff_millis => stale.push(key),
                Some(_) => {}
                // Unparseable key: drop it rather than retaining it forever.
                None => stale.push(key),
            }
        }

        let purged = stale.len();
        for key in stale {
            tree.remove(key)?;
        }
        Ok(purged)
    }

    // -----------------------------------------------------------------------
    // Suggestions
    // -----------------------------------------------------------------------

    /// Persist one generated suggestion.  The session must exist.
    pub fn add_suggestion(
        &self,
        session_id: Uuid,
        pipeline: &str,
        content: &str,
    ) -> Result<Suggestion, StoreError> {
        self.require_session(session_id)?;

        let suggestion = Suggestion {
            id: Uuid::new_v4(),
            session_id: Some(session_id),
            timestamp: Utc::now(),
            pipeline: pipeline.to_string(),
            content: content.to_string(),
            accepted: false,
        };
        let key = Self::timeline_key(session_id, suggestion.timestamp, suggestion.id);
        let blob = self.seal_record(&suggestion)?;
        self.tree(TREE_SUGGESTIONS)?.insert(key.as_bytes(), blob)?;
        Ok(suggestion)
    }

    /// All persisted suggestions for a session, oldest first.
    pub fn suggestions(&self, session_id: Uuid) -> Result<Vec<Suggestion>, StoreError> {
        let prefix = format!("{session_id}/");
        let mut out = Vec::new();
        for item in self.tree(TREE_SUGGESTIONS)?.scan_prefix(prefix.as_bytes()) {
            let (_, blob) = item?;
            out.push(self.open_record(&blob)?);
        }
        Ok(out)
    }

    /// Mark a persisted suggestion as accepted by the user.
    pub fn mark_suggestion_accepted(
        &self,
        session_id: Uuid,
        suggestion_id: Uuid,
    ) -> Result<bool, StoreError> {
        let tree = self.tree(TREE_SUGGESTIONS)?;
        let prefix = format!("{session_id}/");
        for item in tree.scan_prefix(prefix.as_bytes()) {
            let (key, blob) = item?;
            let mut suggestion: Suggestion = self.open_record(&blob)?;
            if suggestion.id == suggestion_id {
                suggestion.accepted = true;
                let blob = self.seal_record(&suggestion)?;
                tree.insert(key, blob)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Action items
    // -----------------------------------------------------------------------

    /// Persist a follow-up item.  The session must exist.
    pub fn add_action_item(
        &self,
        session_id: Uuid,
        owner: &str,
        text: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<ActionItem, StoreError> {
        self.require_session(session_id)?;

        let item = ActionItem {
            id: Uuid::new_v4(),
            session_id,
            owner: owner.to_string(),
            text: text.to_string(),
            due_date,
            completed: false,
        };
        let key = format!("{session_id}/{}", item.id);
        let blob = self.seal_record(&item)?;
        self.tree(TREE_ACTION_ITEMS)?.insert(key.as_bytes(), blob)?;
        Ok(item)
    }

    /// All action items for a session.
    pub fn action_items(&self, session_id: Uuid) -> Result<Vec<ActionItem>, StoreError> {
        let prefix = format!("{session_id}/");
        let mut out = Vec::new();
        for item in self.tree(TREE_ACTION_ITEMS)?.scan_prefix(prefix.as_bytes()) {
            let (_, blob) = item?;
            out.push(self.open_record(&blob)?);
        }
        Ok(out)
    }

    /// Mark an action item completed.
    pub fn complete_action_item(
        &self,
        session_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, StoreError> {
        let tree = self.tree(TREE_ACTION_ITEMS)?;
        let key = format!("{session_id}/{item_id}");
        match tree.get(key.as_bytes())? {
            Some(blob) => {
                let mut item: ActionItem = self.open_record(&blob)?;
                item.completed = true;
                tree.insert(key.as_bytes(), self.seal_record(&item)?)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    /// Overwrite the singleton profile record.
    pub fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let blob = self.seal_record(profile)?;
        self.tree(TREE_PROFILE)?.insert(PROFILE_KEY, blob)?;
        Ok(())
    }

    /// Fetch the profile, if one has been saved.
    pub fn get_profile(&self) -> Result<Option<Profile>, StoreError> {
        match self.tree(TREE_PROFILE)?.get(PROFILE_KEY)? {
            Some(blob) => Ok(Some(self.open_record(&blob)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Integrations
    // -----------------------------------------------------------------------

    /// Upsert credentials for an integration, keyed by provider name.
    pub fn save_integration(&self, credential: &IntegrationCredential) -> Result<(), StoreError> {
        let blob = self.seal_record(credential)?;
        self.tree(TREE_INTEGRATIONS)?
            .insert(credential.provider.as_bytes(), blob)?;
        Ok(())
    }

    /// Fetch stored credentials by provider name.
    pub fn get_integration(
        &self,
        provider: &str,
    ) -> Result<Option<IntegrationCredential>, StoreError> {
        match self.tree(TREE_INTEGRATIONS)?.get(provider.as_bytes())? {
            Some(blob) => Ok(Some(self.open_record(&blob)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Metrics
    // -----------------------------------------------------------------------

    /// Save (or replace) the metrics row for a session.
    pub fn save_metrics(&self, metric: &Metric) -> Result<(), StoreError> {
        self.require_session(metric.session_id)?;
        let blob = self.seal_record(metric)?;
        self.tree(TREE_METRICS)?
            .insert(metric.session_id.to_string().as_bytes(), blob)?;
        Ok(())
    }

    /// Fetch the metrics row for a session.
    pub fn metrics(&self, session_id: Uuid) -> Result<Option<Metric>, StoreError> {
        match self
            .tree(TREE_METRICS)?
            .get(session_id.to_string().as_bytes())?
        {
            Some(blob) => Ok(Some(self.open_record(&blob)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Context cache
    // -----------------------------------------------------------------------

    /// Store a context value with a TTL in seconds.
    pub fn set_context_cache(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let entry = ContextCacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: Utc::now() + Duration::seconds(ttl_seconds as i64),
        };
        let blob = self.seal_record(&entry)?;
        self.tree(TREE_CONTEXT_CACHE)?.insert(key.as_bytes(), blob)?;
        Ok(())
    }

    /// Read a context value.  An expired row behaves as a miss and is
    /// removed on the spot.
    pub fn get_context_cache(&self, key: &str) -> Result<Option<String>, StoreError> {
        let tree = self.tree(TREE_CONTEXT_CACHE)?;
        let Some(blob) = tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let entry: ContextCacheEntry = self.open_record(&blob)?;
        if Utc::now() > entry.expires_at {
            tree.remove(key.as_bytes())?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    /// Remove every expired (or undecodable) cache row; returns how many
    /// were purged.
    pub fn purge_expired_cache(&self) -> Result<usize, StoreError> {
        let tree = self.tree(TREE_CONTEXT_CACHE)?;
        let now = Utc::now();
        let mut stale = Vec::new();

        for item in tree.iter() {
            let (key, blob) = item?;
            match self.open_record::<ContextCacheEntry>(&blob) {
                Ok(entry) if now > entry.expires_at => stale.push(key),
                Ok(_) => {}
                // A row we can no longer open is dead weight.
                Err(_) => stale.push(key),
            }
        }

        let purged = stale.len();
        for key in stale {
            tree.remove(key)?;
        }
        Ok(purged)
    }

    // -----------------------------------------------------------------------
    // Wipe
    // -----------------------------------------------------------------------

    /// Clear every table and destroy the encryption key.
    ///
    /// Ordering: all trees are cleared and flushed first; only then is the
    /// key removed from its backend, and a fresh key installed so the store
    /// stays usable.  If clearing fails the key is left intact and the wipe
    /// can be retried; the key is never destroyed while ciphertext remains.
    pub fn wipe_all_data(&self) -> Result<(), StoreError> {
        for name in ALL_TREES {
            self.tree(name)?.clear()?;
        }
        self.db.flush()?;

        self.keys.destroy()?;
        let fresh = self.keys.load_or_create()?;
        *self.cipher.lock().unwrap() = RecordCipher::new(&fresh);

        log::info!("secure store: all data wiped and key rotated");
        Ok(())
    }
}

impl std::fmt::Debug for SecureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStore")
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Encryption-key lifecycle — OS secret store or restricted key file.
//!
//! [`KeyProvider`] is the capability interface the store uses to obtain and
//! destroy its 256-bit key.  Two implementations exist and are selected
//! explicitly at startup via [`KeyBackend`]:
//!
//! * [`KeyringProvider`] — the platform secret store (`keyring` crate).
//! * [`FileKeyProvider`] — a hex-encoded key file with owner-only
//!   permissions, for hosts without a usable secret store.
//!
//! The key is handed to the cipher once and held only in process memory;
//! no other component reads it.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::crypto::generate_key;

// ---------------------------------------------------------------------------
// KeyError
// ---------------------------------------------------------------------------

/// Errors from key storage backends.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The underlying secret store / filesystem failed.
    #[error("key backend error: {0}")]
    Backend(String),

    /// Stored key material could not be decoded as a 256-bit hex key.
    #[error("stored key material is corrupt")]
    Corrupt,
}

// ---------------------------------------------------------------------------
// KeyProvider trait
// ---------------------------------------------------------------------------

/// Object-safe interface for obtaining and destroying the store key.
///
/// `load_or_create` is called once when the store opens; `destroy` is called
/// by `wipe_all_data` after every table has been cleared.
pub trait KeyProvider: Send + Sync {
    /// Return the existing key, creating and persisting a fresh one when
    /// none is stored yet.
    fn load_or_create(&self) -> Result<[u8; 32], KeyError>;

    /// Remove the key from the backend.  Removing an already-absent key is
    /// a no-op success.
    fn destroy(&self) -> Result<(), KeyError>;
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

fn encode_hex(key: &[u8; 32]) -> String {
    use std::fmt::Write;
    key.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn decode_hex(hex: &str) -> Option<[u8; 32]> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// KeyringProvider
// ---------------------------------------------------------------------------

/// Stores the key hex-encoded in the platform secret store.
pub struct KeyringProvider {
    service: String,
    user: String,
}

impl KeyringProvider {
    /// Create a provider for the given service/user entry.
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| KeyError::Backend(e.to_string()))
    }

    /// Probe whether the platform secret store is usable right now.
    ///
    /// Used once by [`KeyBackend::detect`] at startup; never called per
    /// operation.
    pub fn is_available(&self) -> bool {
        match self.entry() {
            Ok(entry) => match entry.get_password() {
                Ok(_) | Err(keyring::Error::NoEntry) => true,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }
}

impl KeyProvider for KeyringProvider {
    fn load_or_create(&self) -> Result<[u8; 32], KeyError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(hex) => decode_hex(&hex).ok_or(KeyError::Corrupt),
            Err(keyring::Error::NoEntry) => {
                let key = generate_key();
                entry
                    .set_password(&encode_hex(&key))
                    .map_err(|e| KeyError::Backend(e.to_string()))?;
                log::info!("secure store: created new key in OS secret store");
                Ok(key)
            }
            Err(e) => Err(KeyError::Backend(e.to_string())),
        }
    }

    fn destroy(&self) -> Result<(), KeyError> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeyError::Backend(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// FileKeyProvider
// ---------------------------------------------------------------------------

/// Stores the key hex-encoded in a file readable only by the owner.
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    /// Create a provider backed by the given key-file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn restrict_permissions(path: &Path) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        #[cfg(not(unix))]
        {
            let _ = path;
        }
        Ok(())
    }
}

impl KeyProvider for FileKeyProvider {
    fn load_or_create(&self) -> Result<[u8; 32], KeyError> {
        if self.path.exists() {
            let hex = fs::read_to_string(&self.path)
                .map_err(|e| KeyError::Backend(e.to_string()))?;
            return decode_hex(&hex).ok_or(KeyError::Corrupt);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| KeyError::Backend(e.to_string()))?;
        }

        let key = generate_key();
        fs::write(&self.path, encode_hex(&key))
            .map_err(|e| KeyError::Backend(e.to_string()))?;
        Self::restrict_permissions(&self.path)
            .map_err(|e| KeyError::Backend(e.to_string()))?;
        log::info!(
            "secure store: created new key file at {}",
            self.path.display()
        );
        Ok(key)
    }

    fn destroy(&self) -> Result<(), KeyError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KeyError::Backend(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyBackend
// ---------------------------------------------------------------------------

/// Which key storage backend the store should use.
///
/// Selected in configuration; [`KeyBackend::detect`] exists for callers that
/// want "keyring when usable, key file otherwise" resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    /// Platform secret store.
    Keyring,
    /// Restricted-permission local key file.
    File,
}

impl Default for KeyBackend {
    fn default() -> Self {
        Self::Keyring
    }
}

impl KeyBackend {
    /// Build the configured provider.
    ///
    /// `service` names the keyring entry; `key_file` is the file-backend
    /// path.
    pub fn provider(self, service: &str, key_file: &Path) -> Box<dyn KeyProvider> {
        match self {
            KeyBackend::Keyring => Box::new(KeyringProvider::new(service, "store-key")),
            KeyBackend::File => Box::new(FileKeyProvider::new(key_file)),
        }
    }

    /// Probe the secret store once and pick `Keyring` when it is usable,
    /// `File` otherwise.
    pub fn detect(service: &str) -> Self {
        if KeyringProvider::new(service, "store-key").is_available() {
            KeyBackend::Keyring
        } else {
            log::warn!("secure store: OS secret store unavailable, using key file");
            KeyBackend::File
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Authenticated encryption for records at rest.
//!
//! Every value the store persists is serialized and then sealed with
//! AES-256-GCM under a fresh random 96-bit nonce.  The sealed blob layout is
//!
//! ```text
//! ┌────────────┬──────────┬──────────────┐
//! │ nonce (12) │ tag (16) │  ciphertext  │
//! └────────────┴──────────┴──────────────┘
//! ```
//!
//! so each row carries everything needed to decrypt it — there is no
//! separate nonce table.  Opening a blob that was tampered with, or sealed
//! under a different key, fails with [`CryptoError::Integrity`]; it never
//! silently yields wrong plaintext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

/// Nonce length for AES-GCM (96 bits).
pub const NONCE_LEN: usize = 12;
/// Authentication tag length for AES-GCM (128 bits).
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// CryptoError
// ---------------------------------------------------------------------------

/// Errors from the seal/open path.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// The ciphertext or tag failed authentication (tampered data or wrong
    /// key).  The record is unrecoverable.
    #[error("record integrity check failed (tampered ciphertext or wrong key)")]
    Integrity,

    /// The blob is shorter than `nonce + tag` and cannot be parsed.
    #[error("sealed blob truncated ({0} bytes, need at least {min})", min = NONCE_LEN + TAG_LEN)]
    Truncated(usize),

    /// The supplied key material is not 32 bytes.
    #[error("encryption key must be 32 bytes")]
    BadKey,

    /// Sealing failed inside the cipher (should not happen in practice).
    #[error("encryption failed")]
    Encrypt,
}

// ---------------------------------------------------------------------------
// RecordCipher
// ---------------------------------------------------------------------------

/// Seals and opens store records with AES-256-GCM.
///
/// Cheap to clone; the key schedule is shared.  The raw key bytes are not
/// retained — only the expanded cipher state.
#[derive(Clone)]
pub struct RecordCipher {
    cipher: Aes256Gcm,
}

impl RecordCipher {
    /// Build a cipher from a 256-bit key.
    pub fn new(key: &[u8; 32]) -> Self {
        // new_from_slice cannot fail for a 32-byte slice.
        let cipher = Aes256Gcm::new_from_slice(key).expect("32-byte key");
        Self { cipher }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Two calls with identical plaintext produce different blobs.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        // aes-gcm appends the tag to the ciphertext; re-order into
        // nonce ‖ tag ‖ ciphertext.
        let split = sealed.len() - TAG_LEN;
        let (body, tag) = sealed.split_at(split);

        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + body.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(tag);
        out.extend_from_slice(body);
        Ok(out)
    }

    /// Decrypt a blob previously produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Truncated`] — blob shorter than `nonce + tag`.
    /// - [`CryptoError::Integrity`] — authentication failed.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated(blob.len()));
        }
        let (nonce_bytes, rest) = blob.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);

        // Rebuild the ciphertext ‖ tag form the cipher expects.
        let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
        sealed.extend_from_slice(body);
        sealed.extend_from_slice(tag);

        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| CryptoError::Integrity)
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material, even in debug output.
        f.debug_struct("RecordCipher").finish_non_exhaustive()
    }
}

/// Generate a fresh random 256-bit key.
pub fn generate_key() -> [u8; 32] {
    let key = Aes256Gcm::generate_key(OsRng);
    key.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

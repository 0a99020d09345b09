//! Attendance tokens.
//!
//! A token is the base64url (unpadded) encoding of `nonce || ciphertext`,
//! where the ciphertext is the AES-256-GCM sealing of a JSON claims object:
//!
//! ```json
//! {"v": 1, "lecture_id": 42, "student_id": 7, "exp": 1772442600}
//! ```
//!
//! Tokens are stateless. Nothing is stored at issuance and there is no
//! revocation list, so a token stays usable until `exp`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lecture::{LectureId, StudentId};

/// Current claims schema version.
pub const TOKEN_VERSION: u8 = 1;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Optional prefix accepted on configured keys.
const KEY_PREFIX: &str = "base64:";

/// Typed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    pub v: u8,
    pub lecture_id: LectureId,
    pub student_id: StudentId,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(lecture_id: LectureId, student_id: StudentId, expires_at: DateTime<Utc>) -> Self {
        Self {
            v: TOKEN_VERSION,
            lecture_id,
            student_id,
            exp: expires_at.timestamp(),
        }
    }

    /// Check schema version and field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.v != TOKEN_VERSION {
            return Err(Error::invalid_token(format!(
                "unsupported token version {}",
                self.v
            )));
        }
        if self.lecture_id <= 0 || self.student_id <= 0 {
            return Err(Error::invalid_token("token ids must be positive"));
        }
        if self.expires_at().is_none() {
            return Err(Error::invalid_token("token expiry out of range"));
        }
        Ok(())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Expired once `now` is strictly past `exp`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// Seals and opens attendance tokens with a process-wide key.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| {
            Error::config(format!(
                "token key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Build a codec from a base64 key, optionally prefixed with `base64:`.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let raw = trimmed.strip_prefix(KEY_PREFIX).unwrap_or(trimmed);
        let key = STANDARD
            .decode(raw)
            .map_err(|e| Error::config(format!("token key is not valid base64: {}", e)))?;
        Self::new(&key)
    }

    /// Generate a fresh random key, base64 encoded.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        STANDARD.encode(key)
    }

    /// Serialize and encrypt claims into an opaque token.
    pub fn seal(&self, claims: &TokenClaims) -> Result<String> {
        let plaintext = serde_json::to_vec(claims)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| Error::internal("failed to encrypt attendance token"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypt, authenticate, and parse a token.
    ///
    /// Every failure (bad encoding, tampering, wrong key, malformed or
    /// unsupported claims) is reported as `InvalidToken`. Expiry is not
    /// checked here.
    pub fn open(&self, token: &str) -> Result<TokenClaims> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| Error::invalid_token("token is not valid base64url"))?;

        if sealed.len() <= NONCE_LEN {
            return Err(Error::invalid_token("token is truncated"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::invalid_token("token failed authentication"))?;

        let claims: TokenClaims = serde_json::from_slice(&plaintext)
            .map_err(|e| Error::invalid_token(format!("token claims malformed: {}", e)))?;
        claims.validate()?;

        Ok(claims)
    }
}

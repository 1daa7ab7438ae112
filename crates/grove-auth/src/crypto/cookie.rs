//! Encrypted session cookie codec.
//!
//! The session cookie carries `sessionId:userId` sealed with AES-256-GCM
//! under a key derived from the configured session secret. The wire format
//! is two base64url parts:
//!
//! ```text
//! base64url(iv) ":" base64url(ciphertext || tag)
//! ```
//!
//! A legacy three-part HMAC-signed (but unencrypted) cookie is accepted
//! read-only to smooth migration:
//!
//! ```text
//! base64url(sessionId:userId) ":" unix_seconds ":" base64url(hmac)
//! ```
//!
//! The codec never mints the legacy form, and [`SessionCookieCodec::open`]
//! returns `None` on every malformed or tampered input rather than
//! surfacing a decryption error.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::{base64url, base64url_decode, constant_time_eq, derive_key, random_bytes};

/// Number of `:`-separated parts in the legacy HMAC cookie form.
pub const LEGACY_COOKIE_PARTS: usize = 3;

/// HKDF info string for the AEAD cookie key.
const COOKIE_KEY_INFO: &[u8] = b"grove.session-cookie.aead.v2";

/// HKDF info string for the legacy HMAC cookie key.
const LEGACY_KEY_INFO: &[u8] = b"grove.session-cookie.hmac.v1";

/// AES-GCM nonce length in bytes.
const IV_LEN: usize = 12;

type HmacSha256 = Hmac<Sha256>;

/// The decrypted contents of a session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCookiePayload {
    /// The session record id.
    pub session_id: Uuid,
    /// The user that owns the session.
    pub user_id: Uuid,
}

/// Seals and opens session cookies.
///
/// Both keys are derived once from the process-lifetime session secret and
/// are read-shared thereafter.
#[derive(Clone)]
pub struct SessionCookieCodec {
    aead_key: [u8; 32],
    legacy_key: [u8; 32],
}

impl SessionCookieCodec {
    /// Creates a codec from the configured session secret.
    #[must_use]
    pub fn new(session_secret: &[u8]) -> Self {
        Self {
            aead_key: derive_key(session_secret, COOKIE_KEY_INFO),
            legacy_key: derive_key(session_secret, LEGACY_KEY_INFO),
        }
    }

    /// Seals `sessionId:userId` into the encrypted cookie form.
    #[must_use]
    pub fn seal(&self, session_id: Uuid, user_id: Uuid) -> String {
        let plaintext = format!("{session_id}:{user_id}");
        let iv = random_bytes::<IV_LEN>();

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.aead_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .expect("AES-GCM encryption of an in-memory buffer cannot fail");

        format!("{}:{}", base64url(&iv), base64url(&ciphertext))
    }

    /// Opens a session cookie in either the encrypted or the legacy form.
    ///
    /// Returns `None` for anything that does not authenticate: wrong part
    /// count, bad base64, truncated IV, failed AEAD tag, failed HMAC, or a
    /// payload that is not `uuid:uuid`. Tampered input must land here, not
    /// in a panic.
    #[must_use]
    pub fn open(&self, cookie: &str) -> Option<SessionCookiePayload> {
        let parts: Vec<&str> = cookie.split(':').collect();
        match parts.len() {
            2 => self.open_sealed(parts[0], parts[1]),
            LEGACY_COOKIE_PARTS => self.open_legacy(parts[0], parts[1], parts[2]),
            _ => None,
        }
    }

    fn open_sealed(&self, iv_part: &str, ct_part: &str) -> Option<SessionCookiePayload> {
        let iv = base64url_decode(iv_part)?;
        if iv.len() != IV_LEN {
            return None;
        }
        let ciphertext = base64url_decode(ct_part)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.aead_key));
        let plaintext = cipher.decrypt(Nonce::from_slice(&iv), ciphertext.as_ref()).ok()?;
        let plaintext = String::from_utf8(plaintext).ok()?;

        parse_payload(&plaintext)
    }

    /// Read-only acceptance of the legacy signed cookie.
    ///
    /// The signature covers `payload ":" timestamp` so neither can be
    /// swapped independently. Expiry of the referenced session is enforced
    /// by the session store, not here.
    fn open_legacy(
        &self,
        payload_part: &str,
        ts_part: &str,
        sig_part: &str,
    ) -> Option<SessionCookiePayload> {
        // Timestamp must at least parse; replay windows are the store's job.
        ts_part.parse::<i64>().ok()?;

        let presented_sig = base64url_decode(sig_part)?;

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.legacy_key)
            .expect("HMAC accepts any key length");
        mac.update(payload_part.as_bytes());
        mac.update(b":");
        mac.update(ts_part.as_bytes());
        let expected = mac.finalize().into_bytes();

        if !constant_time_eq(&expected, &presented_sig) {
            return None;
        }

        let payload = base64url_decode(payload_part)?;
        let payload = String::from_utf8(payload).ok()?;
        parse_payload(&payload)
    }
}

fn parse_payload(plaintext: &str) -> Option<SessionCookiePayload> {
    let (session_part, user_part) = plaintext.split_once(':')?;
    Some(SessionCookiePayload {
        session_id: Uuid::parse_str(session_part).ok()?,
        user_id: Uuid::parse_str(user_part).ok()?,
    })
}

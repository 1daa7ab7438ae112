//! Shared cryptographic primitives.
//!
//! Everything token-shaped in GroveAuth is built from the helpers here:
//! random generation, URL-safe base64, SHA-256 hashing for at-rest token
//! storage, constant-time comparison, and HKDF-SHA256 key derivation for
//! the session cookie key.
//!
//! # Security
//!
//! - Random values come from the OS RNG via `rand`
//! - Tokens are stored by SHA-256 hash, never plaintext
//! - Equality on secrets uses `subtle::ConstantTimeEq`

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub mod cookie;
pub mod secret;

pub use cookie::{LEGACY_COOKIE_PARTS, SessionCookieCodec};
pub use secret::{generate_client_secret, hash_secret, verify_secret};

/// Fills and returns `N` cryptographically secure random bytes.
#[must_use]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
    bytes
}

/// Generates an opaque high-entropy token: 32 random bytes encoded as
/// base64url without padding (43 characters).
///
/// Used for authorization codes, refresh tokens, device codes, and the
/// internal federated-ceremony state. 256 bits of entropy exceeds the
/// OAuth 2.0 recommendation of at least 128 bits.
#[must_use]
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<32>())
}

/// Encodes bytes as URL-safe base64 without padding.
#[must_use]
pub fn base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes URL-safe base64 without padding.
///
/// Returns `None` on any malformed input; never panics.
#[must_use]
pub fn base64url_decode(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data).ok()
}

/// Hashes a token for at-rest storage: hex-encoded SHA-256.
///
/// Used both when persisting a new token and when looking one up, so the
/// plaintext never has to be stored.
#[must_use]
pub fn sha256_hex(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Raw SHA-256 digest of arbitrary bytes.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time byte equality.
///
/// Timing does not depend on where the inputs diverge. Length mismatch
/// short-circuits, which leaks only the length.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Constant-time string equality.
#[must_use]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Derives a 32-byte key from a secret via HKDF-SHA256.
///
/// `info` domain-separates derived keys so the same configured secret can
/// back more than one purpose without key reuse.
#[must_use]
pub fn derive_key(secret: &[u8], info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, secret);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

//! Client secret generation and verification.
//!
//! Client secrets are hashed with Argon2id before storage and verified in
//! constant time through the PHC verifier. The plaintext secret exists only
//! at generation time and in the registered client's own configuration.
//!
//! # Example
//!
//! ```
//! use grove_auth::crypto::{generate_client_secret, hash_secret, verify_secret};
//!
//! let secret = generate_client_secret();
//! assert!(secret.starts_with("grove_sk_"));
//!
//! let hash = hash_secret(&secret).unwrap();
//! assert!(verify_secret(&secret, &hash).unwrap());
//! assert!(!verify_secret("wrong", &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Generate a new cryptographically secure client secret.
///
/// The secret is a 256-bit random value encoded as hexadecimal with a
/// `grove_sk_` prefix for easy identification in configuration files
/// and secret scanners.
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes = super::random_bytes::<32>();
    format!("grove_sk_{}", hex::encode(bytes))
}

/// Hash a secret for storage using Argon2id.
///
/// Uses a fresh OsRng salt per call and default Argon2id parameters,
/// producing a PHC-formatted string suitable for the client store.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a secret against a stored Argon2 hash.
///
/// Returns `Ok(true)` if the secret matches, `Ok(false)` if it does not.
/// Returns `Err` only if the stored hash is not a valid PHC string.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(secret.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

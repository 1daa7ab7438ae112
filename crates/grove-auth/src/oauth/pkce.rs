//! PKCE (Proof Key for Code Exchange), RFC 7636.
//!
//! PKCE is mandatory for every authorization code this server mints: a code
//! minted without a challenge can never be exchanged. Only the `S256`
//! method is supported; `plain` would let anyone who intercepts the
//! challenge replay it as the verifier, which defeats the point.
//!
//! # Example
//!
//! ```
//! use grove_auth::oauth::{PkceVerifier, PkceChallenge};
//!
//! // Client side: generate a verifier, send its challenge when authorizing.
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier);
//!
//! // Server side: store the challenge, verify at token exchange.
//! let stored = PkceChallenge::new(challenge.as_str().to_string()).unwrap();
//! assert!(stored.verify(&verifier).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the RFC 7636 range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside `[A-Za-z0-9-._~]`.
    #[error("Invalid verifier characters: must be unreserved URI characters")]
    InvalidVerifierCharacters,

    /// Challenge is not valid base64url.
    #[error("Invalid challenge format: must be valid base64url")]
    InvalidChallengeFormat,

    /// Unsupported challenge method (only S256 is supported).
    #[error("Unsupported challenge method: {0}")]
    UnsupportedMethod(String),

    /// The verifier does not hash to the stored challenge.
    #[error("PKCE verification failed")]
    VerificationFailed,
}

impl PkceError {
    /// Returns `true` if this is a verification failure rather than a
    /// malformed-input error.
    #[must_use]
    pub fn is_verification_error(&self) -> bool {
        matches!(self, Self::VerificationFailed)
    }

    /// Get the OAuth 2.0 error code for this error.
    ///
    /// Verification failures are `invalid_grant` so they are
    /// indistinguishable from the other code-exchange failure paths.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_)
            | Self::InvalidVerifierCharacters
            | Self::InvalidChallengeFormat
            | Self::UnsupportedMethod(_) => "invalid_request",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

// =============================================================================
// Challenge Method
// =============================================================================

/// PKCE challenge method. Only S256 is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceChallengeMethod {
    /// SHA-256 hash of the verifier.
    #[default]
    S256,
}

impl PkceChallengeMethod {
    /// Parses a challenge method from its wire form.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything but `"S256"`,
    /// including `"plain"`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Returns the method as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Verifier
// =============================================================================

/// PKCE code verifier.
///
/// Per RFC 7636 §4.1: a high-entropy random string of 43-128 characters
/// drawn from the unreserved set `[A-Z] / [a-z] / [0-9] / "-" / "." /
/// "_" / "~"`.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Creates a verifier from a client-supplied string, validating the
    /// RFC 7636 length and character constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the length or character set is out of range.
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(len));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
        {
            return Err(PkceError::InvalidVerifierCharacters);
        }

        Ok(Self(verifier))
    }

    /// Generates a random verifier: 32 random bytes as base64url
    /// (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::crypto::generate_token())
    }

    /// Returns the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PkceVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Challenge
// =============================================================================

/// PKCE code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Computes the S256 challenge for a verifier.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(verifier.0.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }

    /// Wraps a challenge string received from a client.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::InvalidChallengeFormat` if the string is not
    /// valid base64url.
    pub fn new(challenge: String) -> Result<Self, PkceError> {
        if URL_SAFE_NO_PAD.decode(&challenge).is_err() {
            return Err(PkceError::InvalidChallengeFormat);
        }
        Ok(Self(challenge))
    }

    /// Verifies that a verifier satisfies this challenge.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` on mismatch.
    pub fn verify(&self, verifier: &PkceVerifier) -> Result<(), PkceError> {
        let expected = Self::from_verifier(verifier);
        if crate::crypto::constant_time_str_eq(&self.0, &expected.0) {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }

    /// Returns the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the challenge and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PkceChallenge {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

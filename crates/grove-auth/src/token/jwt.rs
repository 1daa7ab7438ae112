//! RS256 access token signing and verification.
//!
//! Access tokens are compact JWTs signed with the process-lifetime RSA
//! private key. The claim set is an interoperable contract: resource
//! servers verify with the public key and depend on `sub`, `email`,
//! `name`, `client_id`, `iss`, `iat`, `exp`.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// RSA modulus size for generated signing keys.
const RSA_KEY_BITS: usize = 2048;

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The token failed to decode or validate.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Failed to generate or parse a signing key.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of the key error.
        message: String,
    },
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Decoding {
                message: err.to_string(),
            },
        }
    }
}

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: the user id.
    pub sub: String,

    /// The user's email.
    pub email: String,

    /// The user's display name.
    pub name: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Fixed issuer URI.
    pub iss: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds), `iat` plus the access token lifetime.
    pub exp: i64,
}

impl AccessTokenClaims {
    /// Builds the claim set for a user/client pair.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        name: impl Into<String>,
        client_id: impl Into<String>,
        issuer: impl Into<String>,
        lifetime: std::time::Duration,
    ) -> Self {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            sub: user_id.to_string(),
            email: email.into(),
            name: name.into(),
            client_id: client_id.into(),
            iss: issuer.into(),
            iat,
            exp: iat + lifetime.as_secs() as i64,
        }
    }
}

/// An RSA keypair for RS256 signing.
pub struct SigningKeyPair {
    /// PEM-encoded PKCS#8 private key.
    private_pem: String,
    /// PEM-encoded SPKI public key.
    public_pem: String,
}

impl SigningKeyPair {
    /// Generates a fresh 2048-bit RSA keypair.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if generation or PEM encoding fails.
    pub fn generate() -> Result<Self, JwtError> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS).map_err(|e| {
            JwtError::InvalidKey {
                message: format!("RSA key generation failed: {e}"),
            }
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::InvalidKey {
                message: format!("private key PEM encoding failed: {e}"),
            })?
            .to_string();
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::InvalidKey {
                message: format!("public key PEM encoding failed: {e}"),
            })?;

        Ok(Self {
            private_pem,
            public_pem,
        })
    }

    /// Loads a keypair from a PEM-encoded PKCS#8 private key, deriving
    /// the public half.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if the PEM does not parse.
    pub fn from_private_pem(pem: &str) -> Result<Self, JwtError> {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| JwtError::InvalidKey {
                message: format!("private key PEM parsing failed: {e}"),
            })?;
        let public_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::InvalidKey {
                message: format!("public key PEM encoding failed: {e}"),
            })?;

        Ok(Self {
            private_pem: pem.to_string(),
            public_pem,
        })
    }

    /// Returns the PEM-encoded public key for resource servers.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }
}

/// Signs and verifies access tokens.
///
/// The keys are immutable for the process lifetime and read-shared.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    public_pem: String,
}

impl JwtService {
    /// Creates a service from a keypair and the fixed issuer URI.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if the key material is unusable.
    pub fn new(key_pair: &SigningKeyPair, issuer: impl Into<String>) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(key_pair.private_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey {
                message: format!("unusable private key: {e}"),
            })?;
        let decoding_key = DecodingKey::from_rsa_pem(key_pair.public_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey {
                message: format!("unusable public key: {e}"),
            })?;

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: issuer.into(),
            public_pem: key_pair.public_pem.clone(),
        })
    }

    /// Signs the claims into a compact RS256 JWT.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Encoding` if signing fails.
    pub fn encode(&self, claims: &AccessTokenClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key).map_err(|e| {
            JwtError::Encoding {
                message: e.to_string(),
            }
        })
    }

    /// Decodes and validates an access token: signature, expiry, issuer.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired`, `JwtError::InvalidSignature`, or
    /// `JwtError::Decoding` depending on what failed.
    pub fn decode(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// The issuer this service stamps and requires.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// PEM-encoded public key, served to resource servers.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }
}

//! Token minting, validation, and grant orchestration.
//!
//! This module provides:
//!
//! - RS256 access token generation and validation
//! - Hash-stored rotating refresh tokens
//! - The token service driving code exchange, rotation, revocation,
//!   and device-flow polling

pub mod jwt;
pub mod refresh;
pub mod service;

pub use jwt::{AccessTokenClaims, JwtError, JwtService, SigningKeyPair};
pub use refresh::RefreshToken;
pub use service::{TokenService, TokenServiceConfig};

//! OAuth 2.1 authorization server core.
//!
//! This module provides:
//!
//! - PKCE verifier/challenge handling (S256 only)
//! - One-time authorization codes bound to (client, user, redirect, challenge)
//! - Pending federated-ceremony state rows
//! - Token endpoint wire types

pub mod code;
pub mod pkce;
pub mod state;
pub mod token;

pub use code::AuthorizationCode;
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use state::OAuthState;
pub use token::{TokenErrorBody, TokenErrorCode, TokenRequest, TokenResponse};

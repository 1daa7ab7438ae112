//! # grove-auth
//!
//! The GroveAuth authorization-server kernel.
//!
//! This crate provides:
//! - The OAuth 2.1 authorization-code flow with mandatory PKCE
//! - Refresh-token rotation with replay detection
//! - The email magic-code ceremony with anti-enumeration and lockout
//! - The RFC 8628 device-authorization grant
//! - Federated sign-in through external identity providers
//! - Per-user sharded sessions with encrypted cookies
//! - The rate-limit, lockout, and audit substrates the ceremonies share
//!
//! ## Modules
//!
//! - [`config`] - Kernel configuration
//! - [`crypto`] - Crypto primitives (random, AEAD cookies, secret hashing)
//! - [`oauth`] - PKCE, authorization codes, ceremony state, wire types
//! - [`token`] - JWT minting, refresh tokens, grant orchestration
//! - [`magic`] - Magic-code engine and mailer seam
//! - [`deviceflow`] - Device-authorization engine
//! - [`federation`] - External identity provider adapter
//! - [`session`] - Per-user sharded session store
//! - [`ratelimit`] - Fixed-window rate limiter
//! - [`lockout`] - Failed-attempt lockout policy
//! - [`audit`] - Security event audit logging
//! - [`storage`] - Storage traits for auth-related data
//! - [`http`] - Axum handlers for every ceremony endpoint

pub mod audit;
pub mod config;
pub mod crypto;
pub mod deviceflow;
pub mod error;
pub mod federation;
pub mod http;
pub mod lockout;
pub mod magic;
pub mod oauth;
pub mod ratelimit;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

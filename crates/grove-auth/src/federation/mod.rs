//! Federated sign-in through external identity providers.
//!
//! Each provider is a configured variant of the same capability set:
//! an authorize URL to send the user to, a token endpoint to exchange
//! the callback code at, and a userinfo endpoint to read identity claims
//! from. The adapter normalizes whatever comes back into a
//! [`FederatedIdentity`] and materializes the local user.

pub mod identity;
pub mod provider;
pub mod service;

pub use identity::FederatedIdentity;
pub use provider::IdentityProviderConfig;
pub use service::{CallbackOutcome, FederationService, StartAuthRequest};

//! Client storage trait.
//!
//! Clients are created out-of-band (bootstrap or administrative migration)
//! and are effectively read-only at request time.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage operations for registered OAuth clients.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its OAuth `client_id`.
    ///
    /// Returns `None` if the client doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Finds the client that registered the given CORS origin, if any.
    ///
    /// Used by the CORS layer: `Access-Control-Allow-Origin` is only ever
    /// set when the request origin matches a registered client origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_origin(&self, origin: &str) -> AuthResult<Option<Client>>;

    /// Registers a client. Validates the registration first.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or a client with the same
    /// `client_id` already exists.
    async fn create(&self, client: &Client) -> AuthResult<()>;

    /// Lists all registered clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;
}

//! Common domain types shared across the kernel.
//!
//! ## Domain Types
//!
//! - [`Client`] - A registered OAuth 2.0 client application
//! - [`User`] - An authenticated end-user
//! - [`GrantType`] - Supported OAuth grant types

pub mod client;
pub mod user;

pub use client::{Client, ClientValidationError, GrantType};
pub use user::User;

//! # grove-auth-memory
//!
//! In-memory implementations of every `grove-auth` storage trait.
//!
//! Suitable for tests and single-node deployments: rows live in
//! `tokio::sync::RwLock`-guarded maps, and the operations the kernel
//! depends on for atomicity (code consume, conditional refresh-token
//! revocation, failed-attempt increment, device-code transitions) hold
//! the write lock for the whole read-check-write step.
//!
//! A SQL backend would implement the same traits with conditional
//! `UPDATE ... RETURNING` statements instead.

pub mod audit;
pub mod client;
pub mod code;
pub mod device_code;
pub mod failed_attempt;
pub mod magic_code;
pub mod oauth_state;
pub mod refresh_token;
pub mod user;

pub use audit::MemoryAuditStorage;
pub use client::MemoryClientStorage;
pub use code::MemoryAuthCodeStorage;
pub use device_code::MemoryDeviceCodeStorage;
pub use failed_attempt::MemoryFailedAttemptStorage;
pub use magic_code::MemoryMagicCodeStorage;
pub use oauth_state::MemoryOAuthStateStorage;
pub use refresh_token::MemoryRefreshTokenStorage;
pub use user::{MemoryAllowlistStorage, MemoryUserStorage};

//! Storage traits for the kernel's persistent rows.
//!
//! Each ceremony exclusively owns the rows it mints; these traits are the
//! shared back end. Two operations carry atomicity contracts the engines
//! depend on:
//!
//! - [`AuthCodeStorage::consume`] - conditional mark-used returning the row
//!   only if it was pending, unexpired, and bound to the stated client
//! - [`FailedAttemptStorage::record_failure`] - transactional increment
//!   that sets the lock timestamp when the threshold is reached
//!
//! Expiry sweeps (`cleanup_expired`) are a size-management optimization
//! only: every read path re-verifies expiry, so correctness never depends
//! on a sweep having run.

pub mod audit;
pub mod client;
pub mod code;
pub mod device_code;
pub mod failed_attempt;
pub mod magic_code;
pub mod oauth_state;
pub mod refresh_token;
pub mod user;

pub use audit::AuditStorage;
pub use client::ClientStorage;
pub use code::AuthCodeStorage;
pub use device_code::DeviceCodeStorage;
pub use failed_attempt::FailedAttemptStorage;
pub use magic_code::MagicCodeStorage;
pub use oauth_state::OAuthStateStorage;
pub use refresh_token::RefreshTokenStorage;
pub use user::{AllowlistStorage, UserStorage};

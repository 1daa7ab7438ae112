//! Email magic-code ceremony.
//!
//! A six-digit numeric code is mailed to the user, verified within ten
//! minutes, and promoted to an ordinary authorization code on success.
//! The send path is indistinguishable between allowed, unknown, and
//! locked emails; the verify path enforces the failed-attempt lockout.

pub mod engine;
pub mod mailer;

pub use engine::{MagicCodeService, MagicSendOutcome, MagicVerifyRequest};
pub use mailer::{LogMailer, MagicCodeMailer};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of digits in a magic code.
pub const MAGIC_CODE_DIGITS: usize = 6;

/// A single-use emailed magic code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicCode {
    /// Lowercased email the code is scoped to.
    pub email: String,

    /// The six-digit numeric code, zero-padded.
    pub code: String,

    /// When the code was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the code was used; `None` while pending.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub used_at: Option<OffsetDateTime>,
}

impl MagicCode {
    /// Generates a fresh code for an email.
    #[must_use]
    pub fn generate(email: &str, ttl: std::time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            email: email.to_lowercase(),
            code: Self::generate_digits(),
            created_at: now,
            expires_at: now + ttl,
            used_at: None,
        }
    }

    /// Generates six random decimal digits, zero-padded.
    #[must_use]
    pub fn generate_digits() -> String {
        let n: u32 = rand::Rng::gen_range(&mut rand::thread_rng(), 0..1_000_000);
        format!("{n:06}")
    }

    /// Returns `true` if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the code has been used.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Returns `true` if the code is still verifiable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_used()
    }
}

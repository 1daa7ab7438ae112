//! Device authorization grant (RFC 8628).
//!
//! An input-constrained client requests a `(device_code, user_code)` pair,
//! shows the short user code, and polls the token endpoint while the user
//! approves or denies from a logged-in browser. Device codes are stored by
//! hash; user codes are plaintext by design (short-lived, rate-limited).

pub mod engine;

pub use engine::{DeviceAuthorizationResponse, DeviceFlowService};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Alphabet for user codes.
///
/// No vowels, so random codes cannot spell words; no `0/O/1/I/L`, so
/// nothing a user might misread over a TV screen.
pub const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ23456789";

/// Characters in a user code, excluding the group separator.
pub const USER_CODE_LENGTH: usize = 8;

/// Lifecycle of a device authorization.
///
/// `Pending` may move to `Authorized` or `Denied`; those and `Expired`
/// are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCodeStatus {
    /// Waiting for the user's decision.
    Pending,
    /// The user approved; the next poll exchanges it for tokens.
    Authorized,
    /// The user denied.
    Denied,
    /// The code expired before a decision.
    Expired,
}

impl DeviceCodeStatus {
    /// Returns `true` for statuses no transition may leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A device authorization in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodeRecord {
    /// Record id.
    pub id: Uuid,

    /// SHA-256 hash of the device code (the CLI-side secret).
    pub device_code_hash: String,

    /// The user-typed code, canonical `XXXX-XXXX` form.
    pub user_code: String,

    /// Client that initiated the flow.
    pub client_id: String,

    /// Requested scope.
    pub scope: String,

    /// Current lifecycle state.
    pub status: DeviceCodeStatus,

    /// User who decided, once someone has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    /// When the flow started.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the pair expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Most recent token-endpoint poll.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_polled_at: Option<OffsetDateTime>,
}

impl DeviceCodeRecord {
    /// Returns `true` if the pair has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

/// Generates a random user code in canonical `XXXX-XXXX` form.
#[must_use]
pub fn generate_user_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = (0..USER_CODE_LENGTH)
        .map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
        .collect();
    format!(
        "{}-{}",
        chars[..4].iter().collect::<String>(),
        chars[4..].iter().collect::<String>()
    )
}

/// Normalizes user input to the canonical `XXXX-XXXX` form.
///
/// Accepts lowercase and a missing or misplaced separator; returns `None`
/// when the cleaned input is not exactly eight alphabet characters.
#[must_use]
pub fn normalize_user_code(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() != USER_CODE_LENGTH {
        return None;
    }
    if !cleaned.bytes().all(|b| USER_CODE_ALPHABET.contains(&b)) {
        return None;
    }
    Some(format!("{}-{}", &cleaned[..4], &cleaned[4..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_user_code_shape() {
        for _ in 0..100 {
            let code = generate_user_code();
            assert_eq!(code.len(), 9);
            assert_eq!(code.as_bytes()[4], b'-');
            for b in code.bytes().filter(|b| *b != b'-') {
                assert!(USER_CODE_ALPHABET.contains(&b), "unexpected char in {code}");
            }
        }
    }

    #[test]
    fn test_alphabet_has_no_confusables_or_vowels() {
        for forbidden in b"AEIOU01lLoO" {
            assert!(!USER_CODE_ALPHABET.contains(forbidden));
        }
    }

    #[test]
    fn test_normalize_user_code() {
        assert_eq!(
            normalize_user_code("BCDF-GHJK").as_deref(),
            Some("BCDF-GHJK")
        );
        assert_eq!(normalize_user_code("bcdfghjk").as_deref(), Some("BCDF-GHJK"));
        assert_eq!(
            normalize_user_code(" bcdf ghjk ").as_deref(),
            Some("BCDF-GHJK")
        );
        assert!(normalize_user_code("BCDF-GHJ").is_none());
        assert!(normalize_user_code("BCDF-GHJKX").is_none());
        // 'O' is not in the alphabet
        assert!(normalize_user_code("OCDF-GHJK").is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!DeviceCodeStatus::Pending.is_terminal());
        assert!(DeviceCodeStatus::Authorized.is_terminal());
        assert!(DeviceCodeStatus::Denied.is_terminal());
        assert!(DeviceCodeStatus::Expired.is_terminal());
    }
}

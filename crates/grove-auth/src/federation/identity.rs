//! Normalized identity claims from external providers.
//!
//! Whatever shape a provider's userinfo endpoint returns, the adapter
//! reduces it to the five fields the rest of the system consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity claims normalized from a provider's userinfo response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederatedIdentity {
    /// Email address, lowercased.
    pub email: String,

    /// Display name; falls back to the email's local part.
    pub name: String,

    /// Avatar URI, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// The provider id ("google", "github").
    pub provider: String,

    /// The provider's subject identifier for this account.
    pub provider_id: String,
}

impl FederatedIdentity {
    /// Normalizes a userinfo JSON document.
    ///
    /// Field fallbacks cover the common provider dialects: `sub` or `id`
    /// for the subject, `name` or `given_name` + `family_name` for the
    /// display name, `picture` or `avatar_url` for the avatar.
    ///
    /// Returns `None` if the document has no usable email or subject.
    #[must_use]
    pub fn from_userinfo(provider: &str, userinfo: &Value) -> Option<Self> {
        let email = userinfo.get("email")?.as_str()?.to_lowercase();
        if email.is_empty() {
            return None;
        }

        let provider_id = userinfo
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| userinfo.get("id").map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }))?;

        let name = userinfo
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                let given = userinfo.get("given_name").and_then(Value::as_str)?;
                let family = userinfo.get("family_name").and_then(Value::as_str)?;
                Some(format!("{given} {family}"))
            })
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

        let avatar = userinfo
            .get("picture")
            .or_else(|| userinfo.get("avatar_url"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            email,
            name,
            avatar,
            provider: provider.to_string(),
            provider_id,
        })
    }
}

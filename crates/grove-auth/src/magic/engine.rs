//! Magic-code send and verify.
//!
//! # Send
//!
//! After the handler's rate limits and client/redirect validation, the
//! engine always reports success. Only when the email is on the allowlist
//! (or public signup is on) and the account is not locked does a code
//! actually get generated, persisted, and handed to the mailer. The
//! caller cannot tell the branches apart from the outcome.
//!
//! # Verify
//!
//! A locked account answers `423` with `locked_until`. A miss records a
//! failed attempt, which may itself trip the lock. A hit marks the code
//! used, clears the attempt row, materializes the user, and promotes the
//! ceremony to an ordinary authorization code carried back on the
//! client's redirect URI.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use crate::audit::{AuditEventKind, AuditLogger, RequestMeta};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::magic::{MagicCode, MagicCodeMailer};
use crate::oauth::AuthorizationCode;
use crate::storage::{
    AllowlistStorage, AuthCodeStorage, FailedAttemptStorage, MagicCodeStorage, UserStorage,
};
use crate::types::{Client, User};
use crate::AuthResult;

/// What the send path actually did, for auditing only.
///
/// The HTTP response is identical in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicSendOutcome {
    /// A code was generated and handed to the mailer.
    Sent,
    /// The email is not eligible; nothing was sent.
    Suppressed,
}

/// Parameters of a verify call.
#[derive(Debug, Clone)]
pub struct MagicVerifyRequest {
    /// Email the code was sent to.
    pub email: String,
    /// The six-digit code as typed.
    pub code: String,
    /// Redirect URI to carry the authorization code back on.
    pub redirect_uri: String,
    /// Client-supplied state, echoed back verbatim.
    pub state: Option<String>,
    /// PKCE challenge to bind into the minted authorization code.
    pub code_challenge: Option<String>,
    /// PKCE challenge method ("S256").
    pub code_challenge_method: Option<String>,
}

/// The magic-code engine.
pub struct MagicCodeService {
    codes: Arc<dyn MagicCodeStorage>,
    auth_codes: Arc<dyn AuthCodeStorage>,
    users: Arc<dyn UserStorage>,
    allowlist: Arc<dyn AllowlistStorage>,
    attempts: Arc<dyn FailedAttemptStorage>,
    mailer: Arc<dyn MagicCodeMailer>,
    audit: AuditLogger,
    config: AuthConfig,
}

impl MagicCodeService {
    /// Creates the engine over its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        codes: Arc<dyn MagicCodeStorage>,
        auth_codes: Arc<dyn AuthCodeStorage>,
        users: Arc<dyn UserStorage>,
        allowlist: Arc<dyn AllowlistStorage>,
        attempts: Arc<dyn FailedAttemptStorage>,
        mailer: Arc<dyn MagicCodeMailer>,
        audit: AuditLogger,
        config: AuthConfig,
    ) -> Self {
        Self {
            codes,
            auth_codes,
            users,
            allowlist,
            attempts,
            mailer,
            audit,
            config,
        }
    }

    /// Sends a magic code if the email is eligible.
    ///
    /// The result distinguishes the branches for auditing; the HTTP layer
    /// must render both identically. Rate limiting and client/redirect
    /// validation happen before this call.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure. Mailer failure is
    /// audited, not propagated.
    pub async fn send(
        &self,
        email: &str,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<MagicSendOutcome> {
        let email = email.to_lowercase();

        if !self.is_email_eligible(&email).await? {
            return Ok(MagicSendOutcome::Suppressed);
        }

        if let Some(row) = self.attempts.get(&email).await?
            && row.is_locked()
        {
            return Ok(MagicSendOutcome::Suppressed);
        }

        let code = MagicCode::generate(&email, self.config.lifetimes.magic_code);
        self.codes.create(&code).await?;

        if let Err(err) = self.mailer.send_code(&email, &code.code).await {
            tracing::warn!(error = %err, "magic code delivery failed");
            self.audit.emit(
                AuditEventKind::MagicCodeSent,
                None,
                Some(&client.client_id),
                meta,
                json!({"delivered": false}),
            );
            return Ok(MagicSendOutcome::Sent);
        }

        self.audit.emit(
            AuditEventKind::MagicCodeSent,
            None,
            Some(&client.client_id),
            meta,
            json!({"delivered": true}),
        );
        Ok(MagicSendOutcome::Sent)
    }

    /// Verifies a magic code and promotes it to an authorization code.
    ///
    /// Returns the redirect URI carrying `code` and the client's `state`.
    ///
    /// # Errors
    ///
    /// - `AccountLocked` if the account is locked (before or because of
    ///   this attempt)
    /// - `InvalidCode` on a miss
    /// - `AccessDenied` if the email is not permitted
    pub async fn verify(
        &self,
        request: &MagicVerifyRequest,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<String> {
        let email = request.email.to_lowercase();

        if let Some(row) = self.attempts.get(&email).await?
            && row.is_locked()
        {
            let locked_until = row.locked_until.expect("locked row carries a timestamp");
            return Err(AuthError::AccountLocked { locked_until });
        }

        let Some(_code) = self.codes.consume(&email, &request.code).await? else {
            return self.record_miss(&email, client, meta).await;
        };

        self.attempts.clear(&email).await?;

        if !self.is_email_eligible(&email).await? {
            self.audit.emit(
                AuditEventKind::FailedLogin,
                None,
                Some(&client.client_id),
                meta,
                json!({"method": "magic_code", "reason": "not_allowlisted"}),
            );
            return Err(AuthError::access_denied("email is not permitted"));
        }

        let user = self.materialize_user(&email).await?;

        let auth_code = AuthorizationCode::mint(
            &client.client_id,
            user.id,
            &request.redirect_uri,
            request.code_challenge.clone(),
            request.code_challenge_method.clone(),
            "openid email profile",
            self.config.lifetimes.auth_code,
        );
        self.auth_codes.create(&auth_code).await?;

        self.audit.emit(
            AuditEventKind::MagicCodeVerified,
            Some(user.id),
            Some(&client.client_id),
            meta,
            json!({}),
        );
        self.audit.emit(
            AuditEventKind::Login,
            Some(user.id),
            Some(&client.client_id),
            meta,
            json!({"method": "magic_code"}),
        );

        build_code_redirect(&request.redirect_uri, &auth_code.code, request.state.as_deref())
    }

    async fn record_miss(
        &self,
        email: &str,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<String> {
        let row = self
            .attempts
            .record_failure(
                email,
                self.config.lockout.max_attempts,
                self.config.lockout.lock_duration,
            )
            .await?;

        self.audit.emit(
            AuditEventKind::FailedLogin,
            None,
            Some(&client.client_id),
            meta,
            json!({"method": "magic_code", "attempts": row.count}),
        );

        if row.is_locked() {
            let locked_until = row.locked_until.expect("locked row carries a timestamp");
            return Err(AuthError::AccountLocked { locked_until });
        }
        Err(AuthError::InvalidCode)
    }

    async fn is_email_eligible(&self, email: &str) -> AuthResult<bool> {
        if self.config.public_signup {
            return Ok(true);
        }
        self.allowlist.contains(email).await
    }

    async fn materialize_user(&self, email: &str) -> AuthResult<User> {
        // Mailbox possession is the only identity we have, so the display
        // name starts as the local part.
        let name = email.split('@').next().unwrap_or(email);
        let user = match self.users.find_by_email(email).await? {
            Some(mut existing) => {
                existing.last_login_at = time::OffsetDateTime::now_utc();
                existing
            }
            None => User::new(email, name, "magic"),
        };
        self.users.upsert(user).await
    }
}

/// Appends `code` and `state` query parameters to the redirect URI.
fn build_code_redirect(
    redirect_uri: &str,
    code: &str,
    state: Option<&str>,
) -> AuthResult<String> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|_| AuthError::invalid_request("malformed redirect_uri"))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::testutil::TestBackend;
    use std::sync::Mutex;

    /// Mailer that records what it was asked to send.
    #[derive(Default)]
    struct CaptureMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl MagicCodeMailer for CaptureMailer {
        async fn send_code(&self, email: &str, code: &str) -> AuthResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        backend: Arc<TestBackend>,
        mailer: Arc<CaptureMailer>,
        service: MagicCodeService,
        client: Client,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(TestBackend::new());
        let mailer = Arc::new(CaptureMailer::default());
        let client = backend.seed_client("grove-web", "grove_sk_test").await;

        let mut config = AuthConfig::default();
        config.session_secret = "test".to_string();

        let service = MagicCodeService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            mailer.clone(),
            AuditLogger::new(backend.clone()),
            config,
        );

        Fixture {
            backend,
            mailer,
            service,
            client,
        }
    }

    fn verify_request(email: &str, code: &str) -> MagicVerifyRequest {
        MagicVerifyRequest {
            email: email.to_string(),
            code: code.to_string(),
            redirect_uri: "https://app.grove.example/callback".to_string(),
            state: Some("S1".to_string()),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
            code_challenge_method: Some("S256".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_is_uniform_across_eligibility() {
        let fx = fixture().await;
        fx.backend.add("allowed@example.com").await.unwrap();

        // Allowed address: a code goes out.
        let allowed = fx
            .service
            .send("Allowed@Example.com", &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(allowed, MagicSendOutcome::Sent);

        // Unknown address: nothing goes out, the call still succeeds.
        let unknown = fx
            .service
            .send("stranger@example.com", &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(unknown, MagicSendOutcome::Suppressed);

        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "allowed@example.com");
        assert_eq!(sent[0].1.len(), 6);
    }

    #[tokio::test]
    async fn test_verify_happy_path_promotes_to_auth_code() {
        let fx = fixture().await;
        fx.backend.add("alice@example.com").await.unwrap();

        fx.service
            .send("alice@example.com", &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        let code = fx.mailer.sent.lock().unwrap()[0].1.clone();

        let redirect = fx
            .service
            .verify(
                &verify_request("ALICE@example.com", &code),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap();

        assert!(redirect.starts_with("https://app.grove.example/callback?code="));
        assert!(redirect.ends_with("&state=S1"));

        // Single use: the same code misses on replay.
        assert!(matches!(
            fx.service
                .verify(
                    &verify_request("alice@example.com", &code),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_lockout_after_five_misses_and_reset_on_success() {
        let fx = fixture().await;
        fx.backend.add("bob@example.com").await.unwrap();

        // Four misses are plain rejections.
        for _ in 0..4 {
            assert!(matches!(
                fx.service
                    .verify(
                        &verify_request("bob@example.com", "000000"),
                        &fx.client,
                        &RequestMeta::default()
                    )
                    .await,
                Err(AuthError::InvalidCode)
            ));
        }

        // The fifth trips the lock.
        let err = fx
            .service
            .verify(
                &verify_request("bob@example.com", "000000"),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        let AuthError::AccountLocked { locked_until } = err else {
            panic!("expected AccountLocked, got {err:?}");
        };
        assert!(locked_until > time::OffsetDateTime::now_utc());

        // While locked, even the right code is refused.
        fx.service
            .send("bob@example.com", &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        assert!(matches!(
            fx.service
                .verify(
                    &verify_request("bob@example.com", "123456"),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::AccountLocked { .. })
        ));

        // Clear the lock (as time passing would) and verify for real: the
        // attempt row resets.
        fx.backend.clear("bob@example.com").await.unwrap();
        fx.service
            .send("bob@example.com", &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        let code = fx.mailer.sent.lock().unwrap().last().unwrap().1.clone();
        assert!(
            fx.service
                .verify(
                    &verify_request("bob@example.com", &code),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await
                .is_ok()
        );
        assert!(fx.backend.get("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_rejects_unallowlisted_even_with_right_code() {
        let fx = fixture().await;
        // Seed a code directly; the address is not on the allowlist.
        let code = MagicCode::generate("eve@example.com", std::time::Duration::from_secs(600));
        crate::storage::MagicCodeStorage::create(&*fx.backend, &code)
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .verify(
                    &verify_request("eve@example.com", &code.code),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_build_code_redirect() {
        let uri =
            build_code_redirect("https://app.grove.example/cb", "AC123", Some("S1")).unwrap();
        assert_eq!(uri, "https://app.grove.example/cb?code=AC123&state=S1");

        // Existing query parameters survive.
        let uri = build_code_redirect("https://app.grove.example/cb?keep=1", "AC", None).unwrap();
        assert_eq!(uri, "https://app.grove.example/cb?keep=1&code=AC");
    }

    #[test]
    fn test_build_code_redirect_rejects_garbage() {
        assert!(build_code_redirect("not a url", "AC", None).is_err());
    }
}

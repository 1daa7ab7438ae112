//! Email transport seam for magic codes.
//!
//! The delivery mechanism is an external collaborator behind this trait.
//! Delivery failure never changes the `/magic/send` response body; the
//! engine audits the failure and moves on.

use async_trait::async_trait;

use crate::AuthResult;

/// Delivers magic codes to mailboxes.
#[async_trait]
pub trait MagicCodeMailer: Send + Sync {
    /// Sends `code` to `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. The caller audits the failure
    /// and keeps the uniform success response.
    async fn send_code(&self, email: &str, code: &str) -> AuthResult<()>;
}

/// Development mailer that writes codes to the log instead of a mailbox.
///
/// Not for production use: the code reaches the process log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl MagicCodeMailer for LogMailer {
    async fn send_code(&self, email: &str, code: &str) -> AuthResult<()> {
        tracing::debug!(email = %email, code = %code, "magic code (log mailer)");
        Ok(())
    }
}

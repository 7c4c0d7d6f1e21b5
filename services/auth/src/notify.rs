//! Outbound notification dispatch
//!
//! The session layer hands finished messages to a [`Notifier`]; the
//! implementation decides how to deliver (SMTP, provider API, ...).
//! Verification-code mail is dispatched fire-and-forget: it must not
//! delay the caller's response and a delivery failure must not fail
//! the enclosing operation.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// A rendered notification ready for delivery
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery abstraction
pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error so it can be logged
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local/dev notifier that logs instead of delivering
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email delivery stub"
        );
        Ok(())
    }
}

/// Render the verification-code email
pub fn verification_email(recipient: &str, code: &str, expiry_mins: i64) -> EmailMessage {
    EmailMessage {
        to: recipient.to_string(),
        subject: "Your Fundi verification code".to_string(),
        body: format!(
            "Your verification code is: {code}\n\n\
             This code expires in {expiry_mins} minutes.\n\
             If you did not request it, you can ignore this email."
        ),
    }
}

/// Dispatch a message without blocking the caller
///
/// Failures are logged and swallowed; the enclosing operation has
/// already succeeded by the time delivery is attempted.
pub fn dispatch(notifier: Arc<dyn Notifier>, message: EmailMessage) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notifier.send(&message) {
            error!(to = %message.to, "failed to deliver notification: {e:#}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_contains_code_and_expiry() {
        let message = verification_email("a@x.com", "123456", 5);
        assert_eq!(message.to, "a@x.com");
        assert!(message.body.contains("123456"));
        assert!(message.body.contains("5 minutes"));
    }

    #[test]
    fn log_notifier_always_succeeds() {
        let message = verification_email("a@x.com", "123456", 5);
        assert!(LogNotifier.send(&message).is_ok());
    }
}

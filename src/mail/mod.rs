pub mod resend;

use crate::error::Result;

/// Delivery backend for one-time codes.
enum Delivery {
    /// Development mode: the code is printed to the server log.
    Console,
    /// Production mode: codes go out through the Resend API.
    Resend(resend::ResendMailer),
}

/// Mailer abstraction. Configured from env: with RESEND_API_KEY set it
/// sends real email, otherwise it logs the code to the console (the
/// development behavior).
pub struct Mailer {
    inner: Delivery,
}

impl Mailer {
    pub fn new_from_env() -> Self {
        match resend::ResendMailer::new_from_env() {
            Some(mailer) => Self {
                inner: Delivery::Resend(mailer),
            },
            None => {
                tracing::warn!("RESEND_API_KEY not set, one-time codes will be logged to console");
                Self {
                    inner: Delivery::Console,
                }
            }
        }
    }

    /// Console-only mailer, used in tests.
    pub fn console() -> Self {
        Self {
            inner: Delivery::Console,
        }
    }

    /// Dispatch a one-time code to `email`. A failure here does not
    /// invalidate the code; the caller surfaces it as a delivery error.
    pub async fn send_code(&self, email: &str, code: &str) -> Result<()> {
        match &self.inner {
            Delivery::Console => {
                tracing::info!(email = %email, code = %code, "One-time code (console delivery)");
                Ok(())
            }
            Delivery::Resend(mailer) => {
                let subject = "Your meeting login code".to_string();
                let text = format!(
                    "Your one-time code is: {}\n\nIt expires in 10 minutes.\n\
                     If you didn't request this code, you can ignore this email.\n",
                    code
                );
                mailer.send(vec![email.to_string()], subject, text).await
            }
        }
    }
}

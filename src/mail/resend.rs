use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    /// Returns None when RESEND_API_KEY is absent (console fallback).
    pub fn new_from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;

        let from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "Hushmeet <onboarding@resend.dev>".to_string());

        Some(Self {
            client: Client::new(),
            api_key,
            from,
        })
    }

    pub async fn send(&self, to: Vec<String>, subject: String, text: String) -> Result<()> {
        #[derive(Serialize)]
        struct Payload {
            from: String,
            to: Vec<String>,
            subject: String,
            text: String,
        }

        let payload = Payload {
            from: self.from.clone(),
            to,
            subject,
            text,
        };

        let res = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::DeliveryFailure(format!("Mail send failed: {}", e)))?;

        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::DeliveryFailure(format!(
                "Resend API error: {}",
                body
            )));
        }

        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::security;

/// A live one-time code for an email address. At most one per email;
/// issuing a new code replaces the old one.
#[derive(Debug, Clone)]
struct CodeRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Credential Service: one-time login codes and bearer tokens.
///
/// Everything lives in memory. Tokens are opaque random strings in a
/// valid-token set; they are never associated with the email that
/// produced them, so the service cannot tell you who holds a token.
pub struct CredentialService {
    codes: DashMap<String, CodeRecord>,
    tokens: DashMap<String, DateTime<Utc>>,
    code_ttl: Duration,
    token_ttl: Duration,
}

impl CredentialService {
    pub fn new(code_ttl_seconds: u64, token_ttl_seconds: u64) -> Self {
        Self {
            codes: DashMap::new(),
            tokens: DashMap::new(),
            code_ttl: Duration::seconds(code_ttl_seconds as i64),
            token_ttl: Duration::seconds(token_ttl_seconds as i64),
        }
    }

    /// Generate a fresh 6-digit code for `email`, replacing any live one.
    /// Delivery is the caller's job; the code stays valid even if
    /// delivery later fails.
    pub fn issue_code(&self, email: &str) -> String {
        let code = security::generate_otp_code();
        self.codes.insert(
            email.to_string(),
            CodeRecord {
                code: code.clone(),
                expires_at: Utc::now() + self.code_ttl,
            },
        );

        tracing::debug!(email = %email, "One-time code issued");
        code
    }

    /// Verify a code and mint a bearer token.
    ///
    /// Codes are single-use: a successful verification removes the
    /// record before the token is returned, so the same code is never
    /// accepted twice. A mismatch leaves the record in place.
    pub fn verify_code(&self, email: &str, code: &str) -> Result<String> {
        match self.codes.entry(email.to_string()) {
            Entry::Vacant(_) => Err(AppError::NotFound(
                "Code not found for this email".to_string(),
            )),
            Entry::Occupied(entry) => {
                if Utc::now() > entry.get().expires_at {
                    entry.remove();
                    return Err(AppError::Expired("Code expired".to_string()));
                }
                if !security::ct_eq(&entry.get().code, code) {
                    return Err(AppError::Mismatch("Invalid code".to_string()));
                }

                entry.remove();

                let token = security::generate_token();
                self.tokens
                    .insert(token.clone(), Utc::now() + self.token_ttl);
                Ok(token)
            }
        }
    }

    /// O(1) bearer token check. A token past its expiry is invalid even
    /// before the sweep removes it, so the lazy check and the sweep can
    /// never disagree.
    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens
            .get(token)
            .map(|expires_at| Utc::now() < *expires_at)
            .unwrap_or(false)
    }

    /// Drop expired codes and tokens. Bounds memory growth from
    /// abandoned login attempts.
    pub fn sweep(&self, now: DateTime<Utc>) {
        self.codes.retain(|_, record| now <= record.expires_at);
        self.tokens.retain(|_, expires_at| now <= *expires_at);
    }

    /// Periodic sweep task; spawned once at startup and owned by the
    /// runtime for the life of the process.
    pub async fn run_sweeper(self: Arc<Self>, interval: StdDuration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            self.sweep(Utc::now());
            tracing::trace!("Credential sweep complete");
        }
    }

    #[cfg(test)]
    fn code_count(&self) -> usize {
        self.codes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> CredentialService {
        CredentialService::new(600, 86400)
    }

    #[test]
    fn test_verify_mints_valid_token() {
        let svc = service();
        let code = svc.issue_code("a@example.com");

        let token = svc.verify_code("a@example.com", &code).expect("verify");
        assert_eq!(token.len(), 64);
        assert!(svc.is_valid(&token));
    }

    #[test]
    fn test_code_is_single_use() {
        let svc = service();
        let code = svc.issue_code("a@example.com");

        svc.verify_code("a@example.com", &code).expect("first use");
        let err = svc.verify_code("a@example.com", &code).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_new_code_replaces_old() {
        let svc = service();
        let old = svc.issue_code("a@example.com");
        let new = svc.issue_code("a@example.com");
        assert_eq!(svc.code_count(), 1);

        let err = svc.verify_code("a@example.com", &old).unwrap_err();
        assert!(matches!(err, AppError::Mismatch(_)));
        svc.verify_code("a@example.com", &new).expect("new code works");
    }

    #[test]
    fn test_mismatch_keeps_record() {
        let svc = service();
        let code = svc.issue_code("a@example.com");

        let err = svc.verify_code("a@example.com", "000000").unwrap_err();
        assert!(matches!(err, AppError::Mismatch(_)));

        // Record survives a wrong guess
        svc.verify_code("a@example.com", &code).expect("still valid");
    }

    #[test]
    fn test_expired_code_is_deleted() {
        let svc = service();
        svc.codes.insert(
            "a@example.com".to_string(),
            CodeRecord {
                code: "123456".to_string(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );

        let err = svc.verify_code("a@example.com", "123456").unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
        assert_eq!(svc.code_count(), 0);
    }

    #[test]
    fn test_unknown_email_is_not_found() {
        let svc = service();
        let err = svc.verify_code("nobody@example.com", "123456").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let svc = service();
        svc.tokens
            .insert("deadbeef".to_string(), Utc::now() - Duration::seconds(1));
        assert!(!svc.is_valid("deadbeef"));
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let svc = service();
        svc.codes.insert(
            "old@example.com".to_string(),
            CodeRecord {
                code: "111111".to_string(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );
        let live = svc.issue_code("live@example.com");
        svc.tokens
            .insert("stale".to_string(), Utc::now() - Duration::seconds(1));

        svc.sweep(Utc::now());

        assert_eq!(svc.code_count(), 1);
        assert!(!svc.tokens.contains_key("stale"));
        svc.verify_code("live@example.com", &live).expect("kept");
    }
}

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/send-code", post(send_code))
        .route("/verify-code", post(verify_code))
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub token: String,
}

/// POST /api/v1/auth/send-code - Issue a one-time code and hand it to
/// the delivery collaborator. A delivery failure is surfaced to the
/// caller; the issued code itself stays valid.
async fn send_code(
    State(state): State<AppState>,
    Json(request): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Valid email required".to_string()));
    }

    let code = state.credentials.issue_code(email);
    state.mailer.send_code(email, &code).await?;

    Ok(Json(SendCodeResponse {
        success: true,
        message: "Code sent to email".to_string(),
    }))
}

/// POST /api/v1/auth/verify-code - Exchange a one-time code for a
/// bearer token.
async fn verify_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>> {
    let token = state
        .credentials
        .verify_code(request.email.trim(), request.code.trim())?;

    Ok(Json(VerifyCodeResponse {
        success: true,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mail::Mailer;
    use pretty_assertions::assert_eq;

    fn test_state() -> AppState {
        let config = Config {
            server_host: "localhost".to_string(),
            server_port: 8080,
            meeting_ttl_seconds: 7200,
            code_ttl_seconds: 600,
            token_ttl_seconds: 86400,
            empty_meeting_grace_seconds: 300,
            sweep_interval_seconds: 300,
        };
        AppState::new(config, Mailer::console())
    }

    #[tokio::test]
    async fn test_send_code_rejects_bad_email() {
        let state = test_state();
        let err = send_code(
            State(state),
            Json(SendCodeRequest {
                email: "not-an-email".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_send_then_verify_yields_token() {
        let state = test_state();
        send_code(
            State(state.clone()),
            Json(SendCodeRequest {
                email: "a@example.com".to_string(),
            }),
        )
        .await
        .expect("send");

        // The handler does not leak the code; fetch a fresh one for the
        // verification round instead.
        let code = state.credentials.issue_code("a@example.com");
        let Json(response) = verify_code(
            State(state.clone()),
            Json(VerifyCodeRequest {
                email: "a@example.com".to_string(),
                code,
            }),
        )
        .await
        .expect("verify");

        assert!(response.success);
        assert_eq!(response.token.len(), 64);
        assert!(state.credentials.is_valid(&response.token));
    }

    #[tokio::test]
    async fn test_verify_wrong_code_is_mismatch() {
        let state = test_state();
        state.credentials.issue_code("a@example.com");

        let err = verify_code(
            State(state),
            Json(VerifyCodeRequest {
                email: "a@example.com".to_string(),
                code: "000000".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Mismatch(_)));
    }
}

use axum::{extract::State, routing::post, Json, Router};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::security;
use crate::state::AppState;

/// Meeting routes
pub fn meeting_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_meeting))
        .route("/join", post(join_meeting))
}

#[derive(Debug, Serialize)]
pub struct CreateMeetingResponse {
    pub meeting_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinMeetingRequest {
    pub meeting_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct JoinMeetingResponse {
    pub success: bool,
    pub meeting_id: String,
}

/// Pull the bearer token out of the Authorization header and check it
/// against the valid-token set.
fn require_auth(
    state: &AppState,
    auth: &Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<()> {
    let token = auth
        .as_ref()
        .map(|TypedHeader(Authorization(bearer))| bearer.token())
        .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))?;

    if !state.credentials.is_valid(token) {
        return Err(AppError::Unauthenticated(
            "Invalid or expired token".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/meetings - Create a meeting; the id/password pair is
/// the only credential and is returned exactly once.
async fn create_meeting(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<CreateMeetingResponse>> {
    require_auth(&state, &auth)?;

    let meeting = state.meetings.create();

    Ok(Json(CreateMeetingResponse {
        meeting_id: meeting.id,
        password: meeting.password,
    }))
}

/// POST /api/v1/meetings/join - REST pre-check before opening the
/// signaling channel: meeting must exist and the password must match.
async fn join_meeting(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(request): Json<JoinMeetingRequest>,
) -> Result<Json<JoinMeetingResponse>> {
    require_auth(&state, &auth)?;

    let meeting = state
        .meetings
        .get(&request.meeting_id)
        .ok_or_else(|| AppError::NotFound("Meeting not found".to_string()))?;

    if !security::ct_eq(&meeting.password, &request.password) {
        return Err(AppError::Mismatch("Invalid password".to_string()));
    }

    Ok(Json(JoinMeetingResponse {
        success: true,
        meeting_id: meeting.id,
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

    fn bearer(token: &str) -> Option<TypedHeader<Authorization<Bearer>>> {
        Some(TypedHeader(Authorization::bearer(token).unwrap()))
    }

    fn login(state: &AppState) -> String {
        let code = state.credentials.issue_code("a@example.com");
        state.credentials.verify_code("a@example.com", &code).unwrap()
    }

    #[tokio::test]
    async fn test_create_requires_token() {
        let state = test_state();
        let err = create_meeting(State(state.clone()), None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));

        let err = create_meeting(State(state), bearer("bogus")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_create_then_join_round_trip() {
        let state = test_state();
        let token = login(&state);

        let Json(created) = create_meeting(State(state.clone()), bearer(&token))
            .await
            .expect("create");
        assert_eq!(created.meeting_id.len(), 16);
        assert_eq!(created.password.len(), 8);

        let Json(joined) = join_meeting(
            State(state),
            bearer(&token),
            Json(JoinMeetingRequest {
                meeting_id: created.meeting_id.clone(),
                password: created.password,
            }),
        )
        .await
        .expect("join");
        assert!(joined.success);
        assert_eq!(joined.meeting_id, created.meeting_id);
    }

    #[tokio::test]
    async fn test_join_wrong_password_is_mismatch() {
        let state = test_state();
        let token = login(&state);
        let Json(created) = create_meeting(State(state.clone()), bearer(&token))
            .await
            .expect("create");

        let err = join_meeting(
            State(state),
            bearer(&token),
            Json(JoinMeetingRequest {
                meeting_id: created.meeting_id,
                password: "WRONGPWD".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Mismatch(_)));
    }

    #[tokio::test]
    async fn test_join_unknown_meeting_is_not_found() {
        let state = test_state();
        let token = login(&state);

        let err = join_meeting(
            State(state),
            bearer(&token),
            Json(JoinMeetingRequest {
                meeting_id: "0000000000000000".to_string(),
                password: "AAAAAAAA".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

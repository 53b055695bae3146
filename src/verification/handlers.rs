use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::{
    auth::{dto::MessageResponse, extractors::CurrentUser, validation::normalize_email},
    error::AppError,
    state::AppState,
    verification::service,
};

#[derive(Debug, Default, Deserialize)]
pub struct SendVerificationRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyEmailQuery {
    #[serde(default)]
    pub token: String,
}

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/send-verification-email", post(send_verification_email))
        .route("/verify-email", get(verify_email))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn send_verification_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SendVerificationRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::MalformedBody(e.body_text()))?;

    if let Some(requested) = payload.email.as_deref().map(normalize_email) {
        if !requested.is_empty() && requested != user.email {
            warn!(requested = %requested, "verification requested for another address");
            return Err(AppError::EmailMismatch);
        }
    }

    service::send_verification(&state, user).await?;
    Ok(Json(MessageResponse::new("verification email sent")))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    query: Result<Query<VerifyEmailQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::MalformedBody(e.body_text()))?;
    service::verify_email(&state, &query.token).await?;
    Ok(Json(MessageResponse::new("email verified")))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use serde_json::json;

    use crate::test_support::{json_request, Harness};

    async fn signup(h: &Harness, email: &str) {
        let (status, _) = h
            .post_json(
                "/api/v1/signup",
                json!({ "name": "test", "email": email, "password": "plainPassword123", "role": "admin" }),
            )
            .await;
        assert_eq!(status.as_u16(), 201);
    }

    fn as_user(email: &str, body: serde_json::Value) -> Request<Body> {
        let mut req = json_request("/api/v1/send-verification-email", body);
        req.headers_mut()
            .insert("x-authenticated-email", email.parse().unwrap());
        req
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn send_then_verify_over_http() {
        let h = Harness::new();
        signup(&h, "test@email.com").await;

        let (status, body) = h
            .call(as_user("test@email.com", json!({ "email": "test@email.com" })))
            .await;
        assert_eq!(status.as_u16(), 200, "{body}");

        let calls = h.mailer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, "test@email.com");
        assert_eq!(calls[0].subject, "Email Verification");
        assert!(calls[0]
            .body
            .ends_with("http://localhost:8080/api/v1/verify-email?token=testtoken"));

        let (status, body) = h.call(get("/api/v1/verify-email?token=testtoken")).await;
        assert_eq!(status.as_u16(), 200);
        assert!(body.contains("email verified"));

        let user = h.state.users.find_by_email("test@email.com").await.unwrap();
        assert!(user.is_email_verified);

        let (status, body) = h.call(get("/api/v1/verify-email?token=testtoken")).await;
        assert_eq!(status.as_u16(), 400);
        assert!(body.contains("invalid or expired verification token"));

        let (status, body) = h
            .call(as_user("test@email.com", json!({ "email": "test@email.com" })))
            .await;
        assert_eq!(status.as_u16(), 400);
        assert!(body.contains("email already verified"));
    }

    #[tokio::test]
    async fn send_requires_an_acting_user() {
        let h = Harness::new();
        signup(&h, "test@email.com").await;

        let (status, body) = h
            .post_json(
                "/api/v1/send-verification-email",
                json!({ "email": "test@email.com" }),
            )
            .await;
        assert_eq!(status.as_u16(), 401);
        assert!(body.contains("authentication required"));

        let (status, _) = h
            .call(as_user("ghost@email.com", json!({ "email": "ghost@email.com" })))
            .await;
        assert_eq!(status.as_u16(), 401);
        assert!(h.mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn send_rejects_someone_elses_address() {
        let h = Harness::new();
        signup(&h, "test@email.com").await;

        let (status, body) = h
            .call(as_user("test@email.com", json!({ "email": "other@email.com" })))
            .await;
        assert_eq!(status.as_u16(), 400);
        assert!(body.contains("does not match"));
        assert!(h.mailer.calls().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_bad_gateway() {
        let h = Harness::with(
            crate::test_support::RecordingEmailSender::failing(),
            crate::config::AppConfig::local_defaults(),
        );
        signup(&h, "test@email.com").await;

        let (status, body) = h
            .call(as_user("test@email.com", json!({ "email": "test@email.com" })))
            .await;
        assert_eq!(status.as_u16(), 502);
        assert!(!body.contains("connection refused"));
    }

    #[tokio::test]
    async fn verify_without_token_is_bad_request() {
        let h = Harness::new();
        let (status, body) = h.call(get("/api/v1/verify-email")).await;
        assert_eq!(status.as_u16(), 400);
        assert!(body.contains("token must be provided"));

        let (status, _) = h.call(get("/api/v1/verify-email?token=nope")).await;
        assert_eq!(status.as_u16(), 400);
    }
}

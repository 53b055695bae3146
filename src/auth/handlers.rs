use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, MessageResponse, SignupRequest},
        services::{authenticate, register_user},
    },
    error::AppError,
    state::AppState,
    verification::service::send_verification,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Json(payload) = payload.map_err(|e| AppError::MalformedBody(e.body_text()))?;
    let user = register_user(&state, payload).await?;

    if state.config.verification.send_on_signup {
        // The account exists either way; the user can ask for another link.
        if let Err(e) = send_verification(&state, user).await {
            warn!(error = ?e, "post-signup verification email failed");
        }
    }

    Ok((StatusCode::CREATED, Json(MessageResponse::new("user created"))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::MalformedBody(e.body_text()))?;
    authenticate(&state, payload).await?;
    Ok(Json(MessageResponse::new("user logged in")))
}

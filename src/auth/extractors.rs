use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{
    auth::{repo::RepoError, repo_types::User, validation::normalize_email},
    error::AppError,
    state::AppState,
};

/// The user acting on this request, placed in the request extensions by
/// [`inject_current_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Resolves the identity asserted by the upstream gateway in the trusted
/// header and attaches it to the request. Requests without the header pass
/// through untouched.
pub async fn inject_current_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let asserted = req
        .headers()
        .get(state.config.trusted_user_header.as_str())
        .and_then(|h| h.to_str().ok())
        .map(normalize_email)
        .filter(|e| !e.is_empty());

    if let Some(email) = asserted {
        match state.users.find_by_email(&email).await {
            Ok(user) => {
                debug!(user_id = %user.id, "acting user resolved");
                req.extensions_mut().insert(CurrentUser(user));
            }
            Err(RepoError::NotFound) => {
                warn!(email = %email, "trusted header names unknown user");
            }
            Err(e) => return AppError::from(e).into_response(),
        }
    }

    next.run(req).await
}

use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, SignupRequest},
        repo::RepoError,
        repo_types::{NewUser, User},
        validation::{normalize_email, validate_signup},
    },
    error::AppError,
    state::AppState,
};

/// Validates, hashes and stores a new user.
pub async fn register_user(state: &AppState, req: SignupRequest) -> Result<User, AppError> {
    let valid = validate_signup(&req, state.config.password.min_length).map_err(|e| {
        warn!(reason = %e, "signup rejected");
        e
    })?;

    let password_hash = state.hasher.spawn_hash(valid.password).await?;

    let user = state
        .users
        .create(NewUser {
            name: valid.name,
            email: valid.email,
            password_hash,
            role: valid.role,
        })
        .await
        .map_err(|e| {
            if matches!(e, RepoError::Conflict) {
                warn!("email already registered");
            }
            e
        })?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok(user)
}

/// Checks credentials. Unknown email and wrong password produce the same
/// error and cost the same hashing work.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email);

    let user = match state.users.find_by_email(&email).await {
        Ok(u) => u,
        Err(RepoError::NotFound) => {
            state.hasher.spawn_verify_dummy(req.password).await?;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    let matches = state
        .hasher
        .spawn_verify(user.password_hash.clone(), req.password)
        .await?;
    if !matches {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user)
}

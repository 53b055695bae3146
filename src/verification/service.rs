use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::{
    auth::{repo::RepoError, repo_types::User, validation::ValidationError},
    config::MAX_TOKEN_TTL_MINUTES,
    error::AppError,
    state::AppState,
    verification::mailer::OutgoingEmail,
};

pub const VERIFICATION_SUBJECT: &str = "Email Verification";
pub const VERIFY_EMAIL_PATH: &str = "/api/v1/verify-email";

/// `<base>/api/v1/verify-email?token=<token>`
pub fn verification_link(base_url: &str, token: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base_url)?.join(VERIFY_EMAIL_PATH)?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

pub fn verification_body(link: &Url) -> String {
    format!("Click the link below to verify your email\n{link}")
}

/// Issues a fresh token for `user`, replacing any outstanding one, and mails
/// the link. If the transport fails the token this call wrote is revoked,
/// unless a newer one has replaced it already.
///
/// `user` may be a stale snapshot; the store decides whether the account is
/// still unverified.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn send_verification(state: &AppState, user: User) -> Result<(), AppError> {
    if user.is_email_verified {
        warn!(email = %user.email, "verification requested for verified email");
        return Err(AppError::AlreadyVerified);
    }

    let token = state.tokens.generate();
    let link = verification_link(&state.config.public_base_url, &token)
        .map_err(AppError::Internal)?;

    let issued = state
        .users
        .issue_verification_token(user.id, &token, OffsetDateTime::now_utc())
        .await?;
    if !issued {
        warn!(email = %user.email, "email verified before the token was stored");
        return Err(AppError::AlreadyVerified);
    }

    let smtp = &state.config.smtp;
    let email = OutgoingEmail {
        host: smtp.host.clone(),
        port: smtp.port,
        from: smtp.from.clone(),
        auth_secret: smtp.auth_secret.clone(),
        to: user.email.clone(),
        subject: VERIFICATION_SUBJECT.to_string(),
        body: verification_body(&link),
    };

    let sent = match tokio::time::timeout(smtp.timeout(), state.mailer.send_email(&email)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("email transport timed out after {:?}", smtp.timeout())),
    };

    if let Err(e) = sent {
        match state.users.revoke_verification_token(user.id, &token).await {
            Ok(true) => {}
            Ok(false) => warn!("unsent token already replaced or consumed"),
            Err(rollback) => error!(error = %rollback, "failed to roll back verification token"),
        }
        return Err(AppError::EmailDelivery(e));
    }

    info!(email = %user.email, "verification email sent");
    Ok(())
}

/// Consumes `token`: the owner becomes verified and the token is cleared.
#[instrument(skip_all)]
pub async fn verify_email(state: &AppState, token: &str) -> Result<User, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ValidationError::MissingField("token").into());
    }

    let ttl_minutes = state
        .config
        .verification
        .token_ttl_minutes
        .clamp(0, MAX_TOKEN_TTL_MINUTES);
    let issued_after = OffsetDateTime::now_utc()
        .checked_sub(Duration::minutes(ttl_minutes))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    match state
        .users
        .consume_verification_token(token, issued_after)
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "email verified");
            Ok(user)
        }
        Err(RepoError::NotFound) => {
            warn!("unknown, consumed or expired verification token");
            Err(AppError::InvalidToken)
        }
        Err(e) => Err(e.into()),
    }
}

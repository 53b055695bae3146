use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{
        password::CredentialHasher,
        repo::{PgUserRepository, UserRepository},
    },
    config::{AppConfig, EmailTransport},
    db,
    verification::{
        mailer::{EmailSender, LogEmailSender, SmtpEmailSender},
        token::{OsTokenSource, TokenSource},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<dyn EmailSender>,
    pub tokens: Arc<dyn TokenSource>,
    pub hasher: CredentialHasher,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and picks the email transport.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let mailer: Arc<dyn EmailSender> = match config.email_transport {
            EmailTransport::Smtp => Arc::new(SmtpEmailSender::new(
                config.smtp.tls,
                config.smtp.timeout(),
            )),
            EmailTransport::Log => Arc::new(LogEmailSender),
        };
        info!(transport = ?config.email_transport, "email transport selected");

        let hasher = CredentialHasher::from_config(&config.password)?;

        Ok(Self {
            users: Arc::new(PgUserRepository::new(pool)),
            mailer,
            tokens: Arc::new(OsTokenSource),
            hasher,
            config: Arc::new(config),
        })
    }

    pub fn from_parts(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn EmailSender>,
        tokens: Arc<dyn TokenSource>,
        hasher: CredentialHasher,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            mailer,
            tokens,
            hasher,
            config,
        }
    }
}

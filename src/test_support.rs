use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{memory::MemoryUserRepository, password::CredentialHasher},
    config::AppConfig,
    state::AppState,
    verification::{
        mailer::{EmailSender, OutgoingEmail},
        token::TokenSource,
    },
};

/// Records every message and optionally fails the send.
#[derive(Default)]
pub struct RecordingEmailSender {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: bool,
}

impl RecordingEmailSender {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_email(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

/// Hands out `testtoken`, `testtoken-2`, ... in order.
#[derive(Default)]
pub struct SequenceTokenSource {
    issued: Mutex<usize>,
}

impl TokenSource for SequenceTokenSource {
    fn generate(&self) -> String {
        let mut n = self.issued.lock().unwrap();
        *n += 1;
        if *n == 1 {
            "testtoken".to_string()
        } else {
            format!("testtoken-{}", *n)
        }
    }
}

pub struct Harness {
    pub state: AppState,
    pub users: Arc<MemoryUserRepository>,
    pub mailer: Arc<RecordingEmailSender>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(RecordingEmailSender::default(), AppConfig::local_defaults())
    }

    pub fn with(mailer: RecordingEmailSender, config: AppConfig) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let mailer = Arc::new(mailer);
        let state = AppState::from_parts(
            users.clone(),
            mailer.clone(),
            Arc::new(SequenceTokenSource::default()),
            CredentialHasher::new(1024, 1, 1).expect("test argon2 params"),
            Arc::new(config),
        );
        Self {
            state,
            users,
            mailer,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    /// Sends one request through a fresh router and returns status and body.
    pub async fn call(&self, req: Request<Body>) -> (StatusCode, String) {
        let res = self.router().oneshot(req).await.expect("infallible router");
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> (StatusCode, String) {
        self.call(json_request(path, body)).await
    }
}

pub fn json_request(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod mailer;
pub mod service;
pub mod token;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::verification_routes())
}

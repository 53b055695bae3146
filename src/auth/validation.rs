use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::{dto::SignupRequest, repo_types::Role};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must be provided")]
    MissingField(&'static str),
    #[error("{}", invalid_format_message(.0))]
    InvalidFormat(&'static str),
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
}

fn invalid_format_message(field: &str) -> String {
    match field {
        "email" => "invalid email address".to_string(),
        other => format!("invalid {other}"),
    }
}

/// Signup input that passed every rule.
#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lowercases an address; the stored form of every email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a signup body. Rules run in order and the first failure wins:
/// email presence, email syntax, password presence, password length, role.
pub fn validate_signup(
    req: &SignupRequest,
    min_password_len: usize,
) -> Result<ValidSignup, ValidationError> {
    let email = req
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or(ValidationError::MissingField("email"))?;

    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(ValidationError::MissingField("password"))?;

    if password.chars().count() < min_password_len {
        return Err(ValidationError::TooShort {
            field: "password",
            min: min_password_len,
        });
    }

    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") => Role::default(),
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| ValidationError::InvalidFormat("role"))?,
    };

    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(ValidSignup {
        name,
        email,
        password: password.to_string(),
        role,
    })
}

use derive_more::derive::Display;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    AuthExpired,
    MalformedGeneration(String),
    BadRequest(String),
    RequestTimeout,
    TooManyRequests,
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(StatusCode::UNAUTHORIZED) => AppError::AuthExpired,
            Some(StatusCode::BAD_REQUEST) => AppError::BadRequest(error.to_string()),
            Some(StatusCode::REQUEST_TIMEOUT) => AppError::RequestTimeout,
            Some(StatusCode::TOO_MANY_REQUESTS) => AppError::TooManyRequests,
            _ => AppError::Internal(error.into()),
        }
    }
}

/// Expired sessions surface as plain text in upstream error payloads, so
/// detection is by marker rather than status code alone.
pub fn is_auth_marker(text: &str) -> bool {
    static RE_AUTH: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b401\b|unauthorized|invalid.{0,8}token").unwrap());
    RE_AUTH.is_match(text)
}

impl AppError {
    /// Human-readable banner copy. Three categories: authentication
    /// expired (actionable), malformed generation, and generic failure.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthExpired => {
                "Authentication expired. Please refresh the page and reinstall the app if needed."
                    .to_string()
            }
            AppError::MalformedGeneration(msg) => {
                format!("Failed generating related collections: {msg}. Please try again.")
            }
            other => format!("Something went wrong: {other}. Please try again."),
        }
    }
}

// crates/panel-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Missing CSRF token")]
    MissingCsrfToken,

    #[error("Malformed CSRF token: {0}")]
    MalformedToken(&'static str),

    #[error("CSRF token is bound to another session")]
    CsrfSessionMismatch,

    #[error("CSRF signature mismatch")]
    SignatureMismatch,

    #[error("Account temporarily locked out")]
    LockedOut,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Random source failure: {0}")]
    RandomSource(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SessionNotFound | AppError::SessionExpired | AppError::Auth(_) => {
                StatusCode::UNAUTHORIZED
            },
            AppError::MissingCsrfToken | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedToken(_)
            | AppError::CsrfSessionMismatch
            | AppError::SignatureMismatch => StatusCode::FORBIDDEN,
            AppError::LockedOut | AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::SessionNotFound => "SES_001",
            AppError::SessionExpired => "SES_002",
            // One code for every CSRF failure so callers cannot tell the checks apart
            AppError::MissingCsrfToken
            | AppError::MalformedToken(_)
            | AppError::CsrfSessionMismatch
            | AppError::SignatureMismatch => "CSRF_001",
            // Lockout and rate limiting are deliberately indistinguishable
            AppError::LockedOut | AppError::RateLimited => "RATE_001",
            AppError::RandomSource(_) => "INT_002",
            AppError::Auth(_) => "AUTH_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::Command(_) => "CMD_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::SessionNotFound | AppError::SessionExpired => {
                "Session is no longer valid, please log in again".to_string()
            },
            AppError::MissingCsrfToken
            | AppError::MalformedToken(_)
            | AppError::CsrfSessionMismatch
            | AppError::SignatureMismatch => "Bad request".to_string(),
            AppError::LockedOut | AppError::RateLimited => {
                "Too many requests, please try again later".to_string()
            },
            AppError::Auth(_) => "Unauthorized".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::RandomSource(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Command(_)
            | AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Whether the detailed message would reveal which security check failed
    fn is_security_check(&self) -> bool {
        matches!(
            self,
            AppError::MissingCsrfToken
                | AppError::MalformedToken(_)
                | AppError::CsrfSessionMismatch
                | AppError::SignatureMismatch
                | AppError::LockedOut
                | AppError::RateLimited
                | AppError::Auth(_)
        )
    }

    fn public_message(&self) -> String {
        // Use detailed messages in development, sanitized in production
        if cfg!(debug_assertions) && !self.is_security_check() {
            self.to_string()
        } else {
            self.sanitized_message()
        }
    }

    /// Render as JSON for API callers or as an apology page for browsers
    pub fn respond(self, json: bool) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{self}");
        } else {
            tracing::debug!(code = self.error_code(), "{self}");
        }

        if json {
            self.into_response()
        } else {
            ErrorPage::new(status, self.public_message()).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.public_message();

        // Create a JSON response with error details
        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// Minimal HTML apology page for browser requests
#[derive(Debug, Clone)]
pub struct ErrorPage {
    status: StatusCode,
    message: String,
}

impl ErrorPage {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let code = self.status.as_u16();
        let body = format!(
            "<!DOCTYPE html><html><head><title>{code}</title></head>\
             <body><h1>{code}</h1><p>{}</p></body></html>",
            escape_html(&self.message)
        );
        (self.status, Html(body)).into_response()
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// True when the caller speaks JSON rather than HTML
pub fn wants_json(headers: &HeaderMap) -> bool {
    [header::CONTENT_TYPE, header::ACCEPT].iter().any(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"))
    })
}

// ============================
// crates/panel-lib/src/validation/mod.rs
// ============================
//! Form validation module.

use chrono::NaiveDate;
use proxy_panel_common::{Account, AccountForm, DEFAULT_ALTER_ID};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

const MAX_USERNAME_LENGTH: usize = 64;
const DATE_FORMAT: &str = "%Y-%m-%d";

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid username pattern"));

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid UUID in {field}: {value}")]
    InvalidUuid { field: &'static str, value: String },

    #[error("Invalid date in {field}: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Expiry date {expire} is before start date {start}")]
    ExpiryBeforeStart { start: String, expire: String },

    #[error("Invalid account position: {0}")]
    InvalidPosition(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Validate an account owner name
pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "must be 1 to {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "only letters, digits, '_', '.' and '-' are allowed".to_string(),
        ));
    }
    Ok(())
}

/// Parse a UUID form field
pub fn parse_uuid(field: &'static str, value: &str) -> ValidationResult<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| ValidationError::InvalidUuid {
        field,
        value: value.to_string(),
    })
}

fn parse_date(field: &'static str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Parse the zero-based ledger position sent as `userNumber`
pub fn parse_user_number(value: &str) -> ValidationResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidPosition(value.to_string()))
}

/// Validate an account form and turn it into a ledger record
pub fn validate_account_form(form: &AccountForm) -> ValidationResult<Account> {
    validate_username(&form.username)?;
    let id = parse_uuid("serverUUID", &form.server_uuid)?;
    let device_id = parse_uuid("deviceUUID", &form.device_uuid)?;
    let start = parse_date("startDate", &form.start_date)?;
    let expire = parse_date("expireDate", &form.expire_date)?;

    if expire < start {
        return Err(ValidationError::ExpiryBeforeStart {
            start: form.start_date.clone(),
            expire: form.expire_date.clone(),
        });
    }

    Ok(Account {
        id,
        alter_id: DEFAULT_ALTER_ID,
        username: form.username.clone(),
        device_id,
        start_date: start.format(DATE_FORMAT).to_string(),
        expire_date: expire.format(DATE_FORMAT).to_string(),
    })
}

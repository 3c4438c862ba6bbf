use crate::error::ApiError;

pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_TEXT_LEN: usize = 100_000;

/// Bounds are in characters, not bytes.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Reject a missing or whitespace-only required field, then bound its length.
pub fn check_required<'a>(
    field: &str,
    value: Option<&'a str>,
    max: usize,
) -> Result<&'a str, ApiError> {
    let value = value.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    check_length(field, value, 1, max)?;
    Ok(value)
}

/// A supplied-but-optional field must still be non-blank when present.
pub fn check_optional(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    if let Some(v) = value {
        check_required(field, Some(v), max)?;
    }
    Ok(())
}

pub fn check_email(value: &str) -> Result<(), ApiError> {
    check_length("email", value, 3, 254)?;
    if !value.contains('@') || value.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest("invalid email address".into()));
    }
    Ok(())
}

pub fn check_password(value: &str) -> Result<(), ApiError> {
    check_length("password", value, 6, 1024)
}

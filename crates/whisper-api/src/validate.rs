//! Request field checks shared by the message and reply handlers.

use crate::error::ApiError;

pub const MAX_NICKNAME_LENGTH: usize = 50;

/// Non-blank, at most `max` characters.
pub fn text(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn nickname(value: &str) -> Result<(), ApiError> {
    text("nickname", value, MAX_NICKNAME_LENGTH)
}

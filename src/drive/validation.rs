//! Name rules shared by files and folders.

use crate::{CumulusError, Result};

use super::MAX_NAME_LENGTH;

/// Characters that may not appear in a file or folder name.
pub const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validate a name and return it trimmed.
///
/// A valid name is non-empty after trimming, at most [`MAX_NAME_LENGTH`]
/// characters, and contains neither [`FORBIDDEN_NAME_CHARS`] nor ASCII
/// control characters.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(CumulusError::Validation("Name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CumulusError::Validation(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if trimmed
        .chars()
        .any(|c| FORBIDDEN_NAME_CHARS.contains(&c) || c.is_ascii_control())
    {
        return Err(CumulusError::Validation(
            "Name contains invalid characters".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// `validator` adapter for request DTOs.
pub fn valid_name(value: &str) -> std::result::Result<(), validator::ValidationError> {
    validate_name(value).map(|_| ()).map_err(|e| {
        let message = match e {
            CumulusError::Validation(msg) => msg,
            other => other.to_string(),
        };
        validator::ValidationError::new("invalid_name").with_message(message.into())
    })
}

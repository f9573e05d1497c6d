//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Minimum username length.
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Maximum username length.
pub const USERNAME_MAX_LENGTH: usize = 30;

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
}

/// Validates a username: 3-30 characters of letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
        let mut err = ValidationError::new("username_length");
        err.message = Some("Username must be between 3 and 30 characters".into());
        return Err(err);
    }

    if !USERNAME_REGEX.is_match(username) {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username can only contain letters, numbers, and underscores".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a string still has content after trimming whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be empty".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that a score is within the 0-100 range.
pub fn validate_score(score: f64) -> Result<(), ValidationError> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        let mut err = ValidationError::new("score_range");
        err.message = Some("Score must be between 0 and 100".into());
        Err(err)
    }
}

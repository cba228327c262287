//! Validation helpers for DTOs.

use validator::ValidationError;

/// Length of a room join code.
pub const ROOM_CODE_LENGTH: usize = 6;
/// Inclusive bounds for study/break phase durations, in seconds.
pub const DURATION_RANGE_SECS: (u32, u32) = (1, 14_400);
/// Inclusive bounds for per-question time limits, in seconds.
pub const QUESTION_TIME_LIMIT_RANGE_SECS: (u32, u32) = (5, 120);
/// Maximum length of a participant username.
pub const USERNAME_MAX_LENGTH: usize = 24;

/// Validates that a room code is exactly 6 uppercase alphanumeric characters.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("AB12CD") // Ok
/// validate_room_code("ab12cd") // Err - lowercase
/// validate_room_code("AB12C")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {} characters (got {})",
                ROOM_CODE_LENGTH,
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message =
            Some("Room code must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a username is non-blank and at most 24 characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        let mut err = ValidationError::new("username_blank");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }

    if username.chars().count() > USERNAME_MAX_LENGTH {
        let mut err = ValidationError::new("username_length");
        err.message =
            Some(format!("Username must be at most {USERNAME_MAX_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a study or break phase duration.
pub fn validate_phase_duration(seconds: u32) -> Result<(), ValidationError> {
    let (min, max) = DURATION_RANGE_SECS;
    if seconds < min || seconds > max {
        let mut err = ValidationError::new("phase_duration_range");
        err.message =
            Some(format!("Phase duration must be between {min} and {max} seconds").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a per-question time limit.
pub fn validate_question_time_limit(seconds: u32) -> Result<(), ValidationError> {
    let (min, max) = QUESTION_TIME_LIMIT_RANGE_SECS;
    if seconds < min || seconds > max {
        let mut err = ValidationError::new("question_time_limit_range");
        err.message =
            Some(format!("Question time limit must be between {min} and {max} seconds").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("AB12CD").is_ok());
        assert!(validate_room_code("ZZZZZZ").is_ok());
        assert!(validate_room_code("000000").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("AB12C").is_err()); // too short
        assert!(validate_room_code("AB12CDE").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("ab12cd").is_err()); // lowercase
        assert!(validate_room_code("AB 2CD").is_err()); // space
        assert!(validate_room_code("AB-2CD").is_err()); // punctuation
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("  ").is_err());
        assert!(validate_username(&"x".repeat(25)).is_err());
    }

    #[test]
    fn test_validate_phase_duration() {
        assert!(validate_phase_duration(1).is_ok());
        assert!(validate_phase_duration(1500).is_ok());
        assert!(validate_phase_duration(0).is_err());
        assert!(validate_phase_duration(20_000).is_err());
    }

    #[test]
    fn test_validate_question_time_limit() {
        assert!(validate_question_time_limit(30).is_ok());
        assert!(validate_question_time_limit(4).is_err());
        assert!(validate_question_time_limit(200).is_err());
    }
}

//! Validation helpers for DTOs.

use validator::ValidationError;

/// Accepted join-code lengths. Codes are generated at the configured length
/// (6 by default) but lookups tolerate the full range so configuration
/// changes do not invalidate live rooms.
const CODE_MIN_LENGTH: usize = 4;
const CODE_MAX_LENGTH: usize = 10;

const PARTICIPANT_ID_MAX_LENGTH: usize = 64;

/// Validates that a join code is a short alphanumeric token.
///
/// Case is irrelevant: codes are normalized to uppercase before lookup.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.len() < CODE_MIN_LENGTH || code.len() > CODE_MAX_LENGTH {
        let mut err = ValidationError::new("join_code_length");
        err.message = Some(
            format!(
                "join code must be {CODE_MIN_LENGTH} to {CODE_MAX_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("join code must contain only ASCII letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a participant id is a non-empty opaque token without
/// whitespace.
pub fn validate_participant_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > PARTICIPANT_ID_MAX_LENGTH {
        let mut err = ValidationError::new("participant_id_length");
        err.message = Some(
            format!("participant id must be 1 to {PARTICIPANT_ID_MAX_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("participant_id_format");
        err.message = Some("participant id must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_join_code_valid() {
        assert!(validate_join_code("AB12CD").is_ok());
        assert!(validate_join_code("ab12cd").is_ok());
        assert!(validate_join_code("ZZZZ").is_ok());
    }

    #[test]
    fn test_validate_join_code_invalid_length() {
        assert!(validate_join_code("AB1").is_err()); // too short
        assert!(validate_join_code("AB12CD34EF0").is_err()); // too long
        assert!(validate_join_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_join_code_invalid_format() {
        assert!(validate_join_code("AB 2CD").is_err()); // space
        assert!(validate_join_code("AB-2CD").is_err()); // punctuation
        assert!(validate_join_code("AB12Cé").is_err()); // non-ASCII
    }

    #[test]
    fn test_validate_participant_id() {
        assert!(validate_participant_id("user-42").is_ok());
        assert!(validate_participant_id(&"x".repeat(64)).is_ok());
        assert!(validate_participant_id("").is_err());
        assert!(validate_participant_id(&"x".repeat(65)).is_err());
        assert!(validate_participant_id("user 42").is_err());
    }
}

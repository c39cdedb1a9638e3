//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted match identifier.
pub const MATCH_ID_MAX_LENGTH: usize = 64;

/// Validates that a match ID is 1 to 64 characters of ASCII letters, digits,
/// `-` or `_`, so it can be used verbatim as a channel name and document key.
///
/// # Examples
///
/// ```ignore
/// validate_match_id("match-4821") // Ok
/// validate_match_id("")           // Err - empty
/// validate_match_id("match 4821") // Err - space
/// ```
pub fn validate_match_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MATCH_ID_MAX_LENGTH {
        let mut err = ValidationError::new("match_id_length");
        err.message = Some(
            format!(
                "Match ID must be between 1 and {MATCH_ID_MAX_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("match_id_format");
        err.message =
            Some("Match ID must contain only ASCII letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_match_id_valid() {
        assert!(validate_match_id("match-4821").is_ok());
        assert!(validate_match_id("solo_0f3a9c").is_ok());
        assert!(validate_match_id("M").is_ok());
        assert!(validate_match_id(&"a".repeat(MATCH_ID_MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_match_id_invalid_length() {
        assert!(validate_match_id("").is_err());
        assert!(validate_match_id(&"a".repeat(MATCH_ID_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_match_id_invalid_format() {
        assert!(validate_match_id("match 4821").is_err()); // space
        assert!(validate_match_id("match/4821").is_err()); // path separator
        assert!(validate_match_id("match::1").is_err()); // document prefix separator
        assert!(validate_match_id("matché").is_err()); // non-ascii
    }
}

//! Validation helpers for DTOs.

use validator::ValidationError;

/// Difficulty labels understood by the question bank.
pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

/// Validates that a difficulty is one of [`DIFFICULTIES`], ignoring case.
///
/// # Examples
///
/// ```ignore
/// validate_difficulty("easy")   // Ok
/// validate_difficulty("Hard")   // Ok
/// validate_difficulty("brutal") // Err
/// ```
pub fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    if DIFFICULTIES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(value.trim()))
    {
        return Ok(());
    }

    let mut err = ValidationError::new("difficulty");
    err.message = Some(
        format!(
            "Difficulty must be one of {} (got `{value}`)",
            DIFFICULTIES.join(", ")
        )
        .into(),
    );
    Err(err)
}

/// Validates a user identifier minted into tokens: non-empty, no whitespace.
pub fn validate_user_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some("User ID must be non-empty and contain no whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that an explicit question selection lists every id once.
pub fn validate_unique_ids(ids: &[String]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    if let Some(duplicate) = ids.iter().find(|id| !seen.insert(id.trim())) {
        let mut err = ValidationError::new("duplicate_question_id");
        err.message = Some(format!("Question `{duplicate}` is selected more than once").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_difficulty_valid() {
        assert!(validate_difficulty("easy").is_ok());
        assert!(validate_difficulty("MEDIUM").is_ok());
        assert!(validate_difficulty(" hard ").is_ok());
    }

    #[test]
    fn test_validate_difficulty_invalid() {
        assert!(validate_difficulty("").is_err());
        assert!(validate_difficulty("expert").is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("user-42").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("user 42").is_err());
    }

    #[test]
    fn test_validate_unique_ids() {
        assert!(validate_unique_ids(&[]).is_ok());
        assert!(validate_unique_ids(&["q1".into(), "q2".into()]).is_ok());
        assert!(validate_unique_ids(&["q1".into(), "q2".into(), "q1".into()]).is_err());
    }
}

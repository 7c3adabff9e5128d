//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects empty or whitespace-only strings.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Home FC") // Ok
/// validate_not_blank("   ")     // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be empty".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text() {
        assert!(validate_not_blank("Home FC").is_ok());
        assert!(validate_not_blank(" 7 ").is_ok());
    }

    #[test]
    fn rejects_blank() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t").is_err());
    }
}

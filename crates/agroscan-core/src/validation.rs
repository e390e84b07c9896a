//! Client-side form validation.
//!
//! Forms are checked here before any request is built, so malformed input
//! never reaches the API client.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static DOCUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{6,12}$").expect("document pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Document number must contain 6 to 12 digits")]
    InvalidDocumentNumber,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("Email"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("Password"));
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Strip the separators users commonly type (dots, dashes, spaces)
pub fn normalize_document_number(document: &str) -> String {
    document
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect()
}

pub fn validate_document_number(document: &str) -> Result<(), ValidationError> {
    let normalized = normalize_document_number(document);
    if normalized.is_empty() {
        return Err(ValidationError::Required("Document number"));
    }
    if !DOCUMENT_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidDocumentNumber);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("grower@farm.co").is_ok());
        assert!(validate_email("  grower@farm.co ").is_ok());

        assert_eq!(validate_email(""), Err(ValidationError::Required("Email")));
        assert_eq!(validate_email("grower"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("grower@farm"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("gro wer@farm.co"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_validate_password_match() {
        assert!(validate_password_match("s3cret", "s3cret").is_ok());
        assert_eq!(
            validate_password_match("s3cret", "s3cre7"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_password_match("", ""),
            Err(ValidationError::Required("Password"))
        );
    }

    #[test]
    fn test_validate_document_number() {
        assert!(validate_document_number("12345678").is_ok());
        assert!(validate_document_number("12.345.678-9").is_ok());

        assert_eq!(
            validate_document_number("12AB5678"),
            Err(ValidationError::InvalidDocumentNumber)
        );
        assert_eq!(
            validate_document_number("123"),
            Err(ValidationError::InvalidDocumentNumber)
        );
        assert_eq!(
            validate_document_number(" - "),
            Err(ValidationError::Required("Document number"))
        );
    }
}

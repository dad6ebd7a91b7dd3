//! Syntactic validation of fully-qualified bus subjects.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("subject is empty")]
    Empty,
    #[error("subject contains whitespace")]
    Whitespace,
    #[error("subject contains an empty dot-delimited token")]
    EmptyToken,
}

/// Reject subjects that are empty, contain whitespace, or contain an
/// empty `.`-delimited token (e.g. `"a..b"` or `"a. .b"`).
pub fn validate_subject(subject: &str) -> Result<(), SubjectError> {
    if subject.is_empty() {
        return Err(SubjectError::Empty);
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(SubjectError::Whitespace);
    }
    if subject.split('.').any(str::is_empty) {
        return Err(SubjectError::EmptyToken);
    }
    Ok(())
}

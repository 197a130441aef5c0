use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Accepts `value` unless it is blank. The text is kept as given, untrimmed.
///
/// # Errors
///
/// Returns `TextError::Empty` naming `field` when `value` is blank.
pub fn non_blank(field: &'static str, value: impl Into<String>) -> Result<String, TextError> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(TextError::Empty { field });
    }
    Ok(value)
}

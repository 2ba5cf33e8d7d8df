use shared::error::{ApiError, ErrorCode};

/// A license number is exactly three uppercase ASCII letters followed by
/// five ASCII digits.
pub fn license_number_is_valid(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 8
        && bytes[..3].iter().all(u8::is_ascii_uppercase)
        && bytes[3..].iter().all(u8::is_ascii_digit)
}

pub(crate) fn require_license_format(value: &str) -> Result<(), ApiError> {
    if license_number_is_valid(value) {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::InvalidFormat,
            "license number must be 3 uppercase letters followed by 5 digits",
        ))
    }
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::new(
            ErrorCode::InvalidFormat,
            format!("{field} must not be blank"),
        ))
    } else {
        Ok(())
    }
}

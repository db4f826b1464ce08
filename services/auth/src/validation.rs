//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Normalise a phone number into the key codes are stored under
///
/// Only a missing number is rejected. Spaces, dashes, dots and parentheses
/// are dropped so `555-123-4567` and `(555) 123 4567` name the same phone.
pub fn normalize_phone(phone: &str) -> Result<String, String> {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let separators = SEPARATORS
        .get_or_init(|| Regex::new(r"[\s\-.()]").expect("Failed to compile separator regex"));

    let normalized = separators.replace_all(phone.trim(), "").into_owned();
    if normalized.is_empty() {
        return Err("Phone number is required".to_string());
    }

    Ok(normalized)
}

/// True when both numbers normalise to the same phone
pub fn same_phone(a: &str, b: &str) -> bool {
    matches!((normalize_phone(a), normalize_phone(b)), (Ok(a), Ok(b)) if a == b)
}

/// Validate that a code was submitted
///
/// The format is not checked here: a malformed code is a failed attempt,
/// not an input error, and is logged as such.
pub fn validate_code_present(code: &str) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("OTP is required".to_string());
    }
    Ok(())
}

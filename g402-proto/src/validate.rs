//! Schema validation helpers.
//!
//! The wire format keeps addresses and amounts as strings; these helpers
//! enforce their shape without pulling a regex engine: an address is
//! `0x` plus 40 hex digits, an amount is a non-empty run of ASCII digits
//! (arbitrary precision, may exceed the 64-bit range).

use std::fmt;

use serde::Serialize;

/// A single schema violation, pointing at the offending wire field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Wire name of the field (e.g., `maxAmountRequired`, `payload.value`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Joins a list of issues into a single `; `-separated message.
#[must_use]
pub fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Returns whether `s` is a 20-byte hex address (`0x` + 40 hex digits).
#[must_use]
pub fn is_hex_address(s: &str) -> bool {
    is_hex_of_len(s, 40)
}

/// Returns whether `s` is a 32-byte hex value (`0x` + 64 hex digits).
#[must_use]
pub fn is_hex_bytes32(s: &str) -> bool {
    is_hex_of_len(s, 64)
}

/// Returns whether `s` is a non-negative decimal integer of arbitrary
/// precision.
#[must_use]
pub fn is_decimal_amount(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_hex_of_len(s: &str, digits: usize) -> bool {
    s.len() == digits + 2
        && s.starts_with("0x")
        && s.as_bytes()[2..].iter().all(u8::is_ascii_hexdigit)
}

pub(crate) fn check_address(field: &str, value: &str, issues: &mut Vec<ValidationIssue>) {
    if !is_hex_address(value) {
        issues.push(ValidationIssue::new(
            field,
            "must be a 0x-prefixed 20-byte hex address",
        ));
    }
}

pub(crate) fn check_amount(field: &str, value: &str, issues: &mut Vec<ValidationIssue>) {
    if !is_decimal_amount(value) {
        issues.push(ValidationIssue::new(
            field,
            "must be a non-negative decimal integer",
        ));
    }
}

pub(crate) fn check_bytes32(field: &str, value: &str, issues: &mut Vec<ValidationIssue>) {
    if !is_hex_bytes32(value) {
        issues.push(ValidationIssue::new(
            field,
            "must be a 0x-prefixed 32-byte hex value",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_address_shape() {
        assert!(is_hex_address(
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        ));
        assert!(!is_hex_address("0xA0b8"));
        assert!(!is_hex_address("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
        assert!(!is_hex_address(
            "0xZZb86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        ));
    }

    #[test]
    fn decimal_amounts_allow_arbitrary_precision() {
        assert!(is_decimal_amount("0"));
        assert!(is_decimal_amount(
            "340282366920938463463374607431768211456"
        ));
        assert!(!is_decimal_amount(""));
        assert!(!is_decimal_amount("-1"));
        assert!(!is_decimal_amount("1.5"));
        assert!(!is_decimal_amount("1e6"));
    }
}

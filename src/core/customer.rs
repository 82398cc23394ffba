//! Customer details collected before a trip is confirmed

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result, ValidationIssue};

/// Ten digits, mobile prefixes 03, 05, 07, 08 and 09
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0[35789][0-9]{8}$").expect("valid phone pattern"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Who is travelling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl CustomerInfo {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::new("name", "must not be empty"));
        }

        let phone: String = self.phone.chars().filter(|c| !c.is_whitespace()).collect();
        if !PHONE_PATTERN.is_match(&phone) {
            issues.push(ValidationIssue::new(
                "phone",
                "must be 10 digits starting with 03, 05, 07, 08 or 09",
            ));
        }

        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if !EMAIL_PATTERN.is_match(email) {
                issues.push(ValidationIssue::new("email", "is not a valid address"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(issues))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(err: Error) -> Vec<&'static str> {
        match err {
            Error::ValidationFailed(issues) => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("Expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_customer() {
        let customer = CustomerInfo::new("Nguyen Van A", "0912 345 678").with_email("a@example.vn");
        assert!(customer.validate().is_ok());
    }

    #[test]
    fn test_phone_prefixes() {
        for phone in ["0312345678", "0512345678", "0712345678", "0812345678", "0912345678"] {
            assert!(CustomerInfo::new("A", phone).validate().is_ok(), "{phone}");
        }
        for phone in ["0212345678", "0112345678", "091234567", "09123456789", "09-1234567"] {
            assert_eq!(fields(CustomerInfo::new("A", phone).validate().unwrap_err()), ["phone"], "{phone}");
        }
    }

    #[test]
    fn test_all_issues_reported() {
        let customer = CustomerInfo::new("  ", "12345").with_email("not-an-email");
        assert_eq!(fields(customer.validate().unwrap_err()), ["name", "phone", "email"]);
    }

    #[test]
    fn test_blank_email_is_optional() {
        let customer = CustomerInfo::new("B", "0987654321").with_email("  ");
        assert!(customer.validate().is_ok());
    }
}

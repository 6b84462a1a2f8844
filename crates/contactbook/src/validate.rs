//! Field validation for contact records.
//!
//! Validation is a pure function from candidate values to a per-field error
//! map. An empty map means the values may be persisted. Create and edit go
//! through the same rules.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::contact::{ContactFields, Field};
use crate::error::{Error, Result};

/// Prefix every embedded photo must carry.
pub const IMAGE_DATA_PREFIX: &str = "data:image";

/// Minimum name length, in characters.
pub const MIN_NAME_CHARS: usize = 2;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const MOBILE_PATTERN: &str = r"^[0-9]{10}$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("Invalid email pattern"))
}

fn mobile_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MOBILE_PATTERN).expect("Invalid mobile pattern"))
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    /// Create an empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every field passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Whether the given field failed.
    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Record a failure for a field, replacing any earlier one.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    /// Iterate failures in form order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    /// Convert into a result, failing when any field has an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] carrying these messages if non-empty.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Validate candidate contact values.
#[must_use]
pub fn validate(fields: &ContactFields) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    let name = fields.name.trim();
    if name.is_empty() {
        errors.insert(Field::Name, "Name is required");
    } else if name.chars().count() < MIN_NAME_CHARS {
        errors.insert(Field::Name, "Name must be at least 2 characters");
    }

    let dob = fields.dob.trim();
    if dob.is_empty() {
        errors.insert(Field::Dob, "Date of birth is required");
    } else if parse_date(dob).is_none() {
        errors.insert(Field::Dob, "Invalid date");
    }

    let email = fields.email.trim();
    if email.is_empty() {
        errors.insert(Field::Email, "Email is required");
    } else if !email_regex().is_match(email) {
        errors.insert(Field::Email, "Invalid email");
    }

    let mobile = fields.mobile.trim();
    if mobile.is_empty() {
        errors.insert(Field::Mobile, "Mobile is required");
    } else if !mobile_regex().is_match(mobile) {
        errors.insert(Field::Mobile, "Must be 10 digits");
    }

    if let Some(photo) = fields.photo.as_deref().map(str::trim) {
        if !photo.is_empty() && !photo.starts_with(IMAGE_DATA_PREFIX) {
            errors.insert(Field::Photo, "Invalid image file");
        }
    }

    errors
}

/// Validate and convert to a result.
///
/// # Errors
///
/// Returns [`Error::Validation`] if any field fails.
pub fn check(fields: &ContactFields) -> Result<()> {
    validate(fields).into_result()
}

/// Parse a date of birth, accepting `YYYY-MM-DD` or an RFC 3339 date-time.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

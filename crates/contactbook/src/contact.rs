//! Core contact types for contactbook.
//!
//! This module defines the contact record, the candidate field values that a
//! form submission produces, and the patch applied when a record is edited.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a stored contact.
pub type ContactId = String;

/// A named field of a contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Full name.
    Name,
    /// Date of birth.
    Dob,
    /// Email address.
    Email,
    /// Mobile number.
    Mobile,
    /// Embedded photo.
    Photo,
}

impl Field {
    /// All fields in form order.
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Dob,
        Self::Email,
        Self::Mobile,
        Self::Photo,
    ];

    /// Machine name of the field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Dob => "dob",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Photo => "photo",
        }
    }

    /// Human-readable label, as shown next to the input.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Dob => "Date of Birth",
            Self::Email => "Email",
            Self::Mobile => "Mobile Number",
            Self::Photo => "Photo",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The editable values of a contact.
///
/// This is what a form submission produces and what the validator checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    /// Full name.
    pub name: String,
    /// Date of birth as an ISO date string.
    pub dob: String,
    /// Email address.
    pub email: String,
    /// Ten-digit mobile number.
    pub mobile: String,
    /// Embedded image data (`data:image/...`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl ContactFields {
    /// Create field values without a photo.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        dob: impl Into<String>,
        email: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dob: dob.into(),
            email: email.into(),
            mobile: mobile.into(),
            photo: None,
        }
    }

    /// Attach a photo.
    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Trim every text field and drop an empty photo.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            dob: self.dob.trim().to_string(),
            email: self.email.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            photo: self
                .photo
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from),
        }
    }

    /// Get the raw value of a field.
    #[must_use]
    pub fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => Some(&self.name),
            Field::Dob => Some(&self.dob),
            Field::Email => Some(&self.email),
            Field::Mobile => Some(&self.mobile),
            Field::Photo => self.photo.as_deref(),
        }
    }
}

/// A persisted contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique identity, assigned on create and never changed.
    pub id: ContactId,

    /// The record's values.
    #[serde(flatten)]
    pub fields: ContactFields,

    /// When the record was created. Older slots may lack it.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// Create a new record with a fresh identity.
    ///
    /// The values are normalized but not validated; stores validate before
    /// persisting. The creation time is kept to microsecond precision so it
    /// survives every backend unchanged.
    #[must_use]
    pub fn new(fields: &ContactFields) -> Self {
        Self {
            id: Self::generate_id(),
            fields: fields.normalized(),
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Generate a new opaque identity.
    #[must_use]
    pub fn generate_id() -> ContactId {
        Uuid::new_v4().to_string()
    }

    /// Apply a patch, keeping identity and creation time.
    pub fn apply(&mut self, patch: &ContactPatch) {
        self.fields = patch.apply_to(&self.fields);
    }

    /// Whether the record carries a photo.
    #[must_use]
    pub fn has_photo(&self) -> bool {
        self.fields.photo.is_some()
    }
}

/// How an edit treats the photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PhotoChange {
    /// Leave the stored photo as is.
    #[default]
    Keep,
    /// Remove the stored photo.
    Clear,
    /// Replace the stored photo.
    Set(String),
}

/// A partial update to a contact.
///
/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement date of birth.
    pub dob: Option<String>,
    /// Replacement email.
    pub email: Option<String>,
    /// Replacement mobile number.
    pub mobile: Option<String>,
    /// Photo change.
    pub photo: PhotoChange,
}

impl ContactPatch {
    /// Check whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.dob.is_none()
            && self.email.is_none()
            && self.mobile.is_none()
            && self.photo == PhotoChange::Keep
    }

    /// Merge this patch over existing values, returning normalized values.
    #[must_use]
    pub fn apply_to(&self, fields: &ContactFields) -> ContactFields {
        let photo = match &self.photo {
            PhotoChange::Keep => fields.photo.clone(),
            PhotoChange::Clear => None,
            PhotoChange::Set(p) => Some(p.clone()),
        };
        ContactFields {
            name: self.name.clone().unwrap_or_else(|| fields.name.clone()),
            dob: self.dob.clone().unwrap_or_else(|| fields.dob.clone()),
            email: self.email.clone().unwrap_or_else(|| fields.email.clone()),
            mobile: self.mobile.clone().unwrap_or_else(|| fields.mobile.clone()),
            photo,
        }
        .normalized()
    }
}

/// A full form submission replaces every field, including the photo.
impl From<ContactFields> for ContactPatch {
    fn from(fields: ContactFields) -> Self {
        Self {
            name: Some(fields.name),
            dob: Some(fields.dob),
            email: Some(fields.email),
            mobile: Some(fields.mobile),
            photo: fields.photo.map_or(PhotoChange::Clear, PhotoChange::Set),
        }
    }
}

//! Error types for contactbook.
//!
//! This module defines all error types used throughout the contactbook crate,
//! grouped by how the form reacts to them: validation errors are shown per
//! field, everything else becomes an error notice.

use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationErrors;

/// The main error type for contactbook operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Record Errors ===
    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// No record with the given identity exists.
    #[error("contact not found: {id}")]
    NotFound {
        /// The identity that was looked up.
        id: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The local slot exists but does not hold a contact list.
    #[error("contact slot at {path} is corrupt: {source}")]
    CorruptSlot {
        /// Path to the slot file.
        path: PathBuf,
        /// The parse failure.
        #[source]
        source: serde_json::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Photo Errors ===
    /// A photo file could not be turned into image data.
    #[error("cannot load photo {path}: {message}")]
    PhotoLoad {
        /// Path to the photo file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Notification Errors ===
    /// Subscribing to change events failed.
    #[error("change subscription failed: {0}")]
    Subscription(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for contactbook operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl Error {
    /// Create a not-found error for an identity.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a photo load error.
    #[must_use]
    pub fn photo_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PhotoLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error.
    #[must_use]
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription(message.into())
    }

    /// Check if this error means the record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a field validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Field messages, when this is a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

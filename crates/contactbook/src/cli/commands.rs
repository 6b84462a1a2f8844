//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::contact::{ContactFields, ContactPatch, PhotoChange};

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Full name
    #[arg(long)]
    pub name: String,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub dob: String,

    /// Email address
    #[arg(long)]
    pub email: String,

    /// Mobile number (10 digits)
    #[arg(long)]
    pub mobile: String,

    /// Image file to use as the photo
    #[arg(long, value_name = "FILE")]
    pub photo: Option<PathBuf>,
}

impl AddCommand {
    /// Field values for submission, with an already-loaded photo.
    #[must_use]
    pub fn to_fields(&self, photo: Option<String>) -> ContactFields {
        ContactFields {
            name: self.name.clone(),
            dob: self.dob.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            photo,
        }
    }
}

/// Edit command arguments.
///
/// Only the given fields change.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Contact ID
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub dob: Option<String>,

    /// New email address
    #[arg(long)]
    pub email: Option<String>,

    /// New mobile number (10 digits)
    #[arg(long)]
    pub mobile: Option<String>,

    /// Replace the photo with this image file
    #[arg(long, value_name = "FILE", conflicts_with = "clear_photo")]
    pub photo: Option<PathBuf>,

    /// Remove the photo
    #[arg(long)]
    pub clear_photo: bool,
}

impl EditCommand {
    /// The requested changes, with an already-loaded replacement photo.
    #[must_use]
    pub fn to_patch(&self, photo: Option<String>) -> ContactPatch {
        let photo = match photo {
            Some(data) => PhotoChange::Set(data),
            None if self.clear_photo => PhotoChange::Clear,
            None => PhotoChange::Keep,
        };
        ContactPatch {
            name: self.name.clone(),
            dob: self.dob.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            photo,
        }
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Contact ID
    pub id: String,

    /// Confirm the deletion
    #[arg(short, long)]
    pub yes: bool,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Contact ID
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    #[default]
    Table,
    /// One tab-separated line per contact
    Plain,
    /// JSON array
    Json,
}
